// ! Message marshalling
// !
// ! Module defines the marshaller contract the dispatcher consumes and a
// ! default implementation that renders `serde_json::Value` arguments as XML
// ! and parses response envelopes back into a `Value` tree with quick-xml.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::core::error::{SoapError, SoapResult};

/// Key under which element attributes are kept in the object tree
pub const ATTRIBUTES_KEY: &str = "attributes";

/// Key under which text content is kept when an element also has attributes
/// or children
pub const TEXT_KEY: &str = "$value";

/// Converts between argument trees and XML message fragments
///
/// Implementations must be pure with respect to the client: they may be
/// shared across concurrent calls.
pub trait Marshaller: Send + Sync {
    /// Render an RPC-style operation element wrapping one child per argument
    fn to_rpc_xml(
        &self,
        name: &str,
        args: &Value,
        alias: Option<&str>,
        namespace: &str,
    ) -> SoapResult<String>;

    /// Render a document-style message element
    fn to_document_xml(
        &self,
        name: &str,
        args: &Value,
        alias: Option<&str>,
        namespace: Option<&str>,
    ) -> SoapResult<String>;

    /// Render an arbitrary object, optionally wrapped in a named element
    fn object_to_xml(
        &self,
        value: &Value,
        name: Option<&str>,
        alias: Option<&str>,
        namespace: Option<&str>,
    ) -> SoapResult<String>;

    /// Parse a response envelope into an object tree keyed by local names
    ///
    /// The returned object holds the envelope's children (`Header`, `Body`).
    fn from_xml(&self, raw: &str) -> SoapResult<Value>;
}

/// Default quick-xml backed marshaller
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMarshaller;

impl XmlMarshaller {
    /// Create a new marshaller
    pub fn new() -> Self {
        Self
    }
}

impl Marshaller for XmlMarshaller {
    fn to_rpc_xml(
        &self,
        name: &str,
        args: &Value,
        alias: Option<&str>,
        namespace: &str,
    ) -> SoapResult<String> {
        let namespace = (!namespace.is_empty()).then_some(namespace);
        let mut out = String::new();
        open_qualified(&mut out, name, alias, namespace)?;
        match args {
            Value::Object(params) => {
                // Parts are unqualified children of the operation element
                for (key, value) in params {
                    write_element(&mut out, key, value)?;
                }
            }
            Value::Null => {}
            other => {
                return Err(SoapError::marshal(format!(
                    "RPC arguments for '{name}' must be an object, got {}",
                    value_kind(other)
                )));
            }
        }
        close_qualified(&mut out, name, alias);
        Ok(out)
    }

    fn to_document_xml(
        &self,
        name: &str,
        args: &Value,
        alias: Option<&str>,
        namespace: Option<&str>,
    ) -> SoapResult<String> {
        let mut out = String::new();
        open_qualified(&mut out, name, alias, namespace)?;
        write_content(&mut out, args)?;
        close_qualified(&mut out, name, alias);
        Ok(out)
    }

    fn object_to_xml(
        &self,
        value: &Value,
        name: Option<&str>,
        alias: Option<&str>,
        namespace: Option<&str>,
    ) -> SoapResult<String> {
        match name {
            Some(name) => self.to_document_xml(name, value, alias, namespace),
            None => {
                let mut out = String::new();
                write_content(&mut out, value)?;
                Ok(out)
            }
        }
    }

    fn from_xml(&self, raw: &str) -> SoapResult<Value> {
        parse_envelope(raw)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

fn check_name(name: &str) -> SoapResult<()> {
    if is_xml_name(name) {
        Ok(())
    } else {
        Err(SoapError::marshal(format!("'{name}' is not a valid element name")))
    }
}

fn open_qualified(
    out: &mut String,
    name: &str,
    alias: Option<&str>,
    namespace: Option<&str>,
) -> SoapResult<()> {
    check_name(name)?;
    out.push('<');
    if let Some(alias) = alias {
        out.push_str(alias);
        out.push(':');
    }
    out.push_str(name);
    match (alias, namespace) {
        (Some(alias), Some(ns)) => {
            out.push_str(&format!(" xmlns:{alias}=\"{}\"", escape(ns)));
        }
        (None, Some(ns)) => {
            out.push_str(&format!(" xmlns=\"{}\"", escape(ns)));
        }
        _ => {}
    }
    out.push('>');
    Ok(())
}

fn close_qualified(out: &mut String, name: &str, alias: Option<&str>) {
    out.push_str("</");
    if let Some(alias) = alias {
        out.push_str(alias);
        out.push(':');
    }
    out.push_str(name);
    out.push('>');
}

fn write_element(out: &mut String, name: &str, value: &Value) -> SoapResult<()> {
    if name == ATTRIBUTES_KEY || name == TEXT_KEY {
        return Ok(());
    }
    check_name(name)?;
    match value {
        Value::Array(items) => {
            for item in items {
                write_element(out, name, item)?;
            }
        }
        Value::Null => {
            out.push_str(&format!("<{name}/>"));
        }
        _ => {
            out.push('<');
            out.push_str(name);
            write_attributes(out, value)?;
            out.push('>');
            write_content(out, value)?;
            out.push_str(&format!("</{name}>"));
        }
    }
    Ok(())
}

fn write_attributes(out: &mut String, value: &Value) -> SoapResult<()> {
    if let Some(Value::Object(attributes)) = value.get(ATTRIBUTES_KEY) {
        for (key, attr) in attributes {
            check_name(key)?;
            let text = match attr {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!(" {key}=\"{}\"", escape(text.as_str())));
        }
    }
    Ok(())
}

fn write_content(out: &mut String, value: &Value) -> SoapResult<()> {
    match value {
        Value::Object(fields) => {
            if let Some(text) = fields.get(TEXT_KEY) {
                write_content(out, text)?;
            }
            for (key, child) in fields {
                write_element(out, key, child)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                write_content(out, item)?;
            }
        }
        Value::String(s) => out.push_str(&escape(s.as_str())),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => {}
    }
    Ok(())
}

/// Element being assembled while reading
#[derive(Debug, Default)]
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
    nil: bool,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> SoapResult<Self> {
        let name = utf8(start.local_name().as_ref())?.to_string();
        let mut frame = Frame {
            name,
            ..Default::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(|e| SoapError::marshal(format!("Invalid attribute: {e}")))?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let local = utf8(attr.key.local_name().as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            if local == "nil" && (value == "true" || value == "1") {
                frame.nil = true;
                continue;
            }
            frame.attributes.insert(local, Value::String(value));
        }
        Ok(frame)
    }

    fn into_value(self) -> (String, Value) {
        if self.nil {
            return (self.name, Value::Null);
        }
        if self.children.is_empty() && self.attributes.is_empty() {
            return (self.name, Value::String(self.text));
        }
        let mut object = self.children;
        if !self.attributes.is_empty() {
            object.insert(ATTRIBUTES_KEY.to_string(), Value::Object(self.attributes));
        }
        if !self.text.is_empty() {
            object.insert(TEXT_KEY.to_string(), Value::String(self.text));
        }
        (self.name, Value::Object(object))
    }
}

fn utf8(bytes: &[u8]) -> SoapResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SoapError::marshal(format!("Invalid UTF-8: {e}")))
}

fn insert_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

fn parse_envelope(raw: &str) -> SoapResult<Value> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                if root.is_some() {
                    return Err(SoapError::marshal("Content after the document element"));
                }
                stack.push(Frame::open(e)?);
            }
            Event::Empty(ref e) => {
                if root.is_some() {
                    return Err(SoapError::marshal("Content after the document element"));
                }
                let (name, value) = Frame::open(e)?.into_value();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                let text = utf8(&e)?.to_string();
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| SoapError::marshal("Unbalanced closing tag"))?;
                let (name, value) = frame.into_value();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::DocType(_) => {
                return Err(SoapError::marshal("DOCTYPE declarations are not allowed"));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SoapError::marshal("Unexpected end of document"));
    }

    match root {
        Some((name, Value::Object(children))) if name == "Envelope" => Ok(Value::Object(children)),
        Some((name, _)) if name == "Envelope" => Ok(Value::Object(Map::new())),
        Some((name, _)) => Err(SoapError::marshal(format!(
            "Root element '{name}' is not a SOAP Envelope"
        ))),
        None => Err(SoapError::marshal("Empty document")),
    }
}

/// A SOAP Fault reported by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoapFault {
    /// `faultcode` (1.1) or `Code/Value` (1.2)
    pub code: Option<String>,
    /// `faultstring` (1.1) or `Reason/Text` (1.2)
    pub string: Option<String>,
    /// `faultactor`
    pub actor: Option<String>,
    /// Application-specific detail
    pub detail: Option<Value>,
}

impl SoapFault {
    /// Build a fault from the parsed `Fault` element
    pub fn from_value(fault: &Value) -> Self {
        let text = |value: Option<&Value>| -> Option<String> {
            match value? {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get(TEXT_KEY).and_then(Value::as_str).map(String::from),
                _ => None,
            }
        };

        let code = text(fault.get("faultcode"))
            .or_else(|| text(fault.get("Code").and_then(|c| c.get("Value"))));
        let string = text(fault.get("faultstring"))
            .or_else(|| text(fault.get("Reason").and_then(|r| r.get("Text"))));
        let actor = text(fault.get("faultactor"));
        let detail = fault
            .get("detail")
            .or_else(|| fault.get("Detail"))
            .cloned();

        Self {
            code,
            string,
            actor,
            detail,
        }
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.as_deref().unwrap_or("soap:Server"),
            self.string.as_deref().unwrap_or("unknown fault")
        )
    }
}
