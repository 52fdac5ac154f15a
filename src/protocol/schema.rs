// ! Service description model
// !
// ! Module holds the in-memory form of a parsed service description:
// ! services, ports, bindings and the operation descriptors the client binds
// ! against. Parsing WSDL into this model is left to the schema collaborator;
// ! the model is serde-serializable so a pre-compiled description can be
// ! stored and reloaded.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Alias the schema collaborator uses for the target namespace entry.
pub const TNS_PREFIX: &str = "__tns__";

/// Namespaces that never belong in the envelope root.
const SKIPPED_NAMESPACES: &[&str] = &[
    "http://xml.apache.org/xml-soap",
    "http://schemas.xmlsoap.org/wsdl/",
    "http://schemas.xmlsoap.org/wsdl/soap/",
    "http://schemas.xmlsoap.org/wsdl/soap12/",
    "http://schemas.xmlsoap.org/soap/encoding/",
    "http://www.w3.org/2001/XMLSchema",
];

const SKIPPED_NAMESPACE_PREFIXES: &[&str] = &[
    "http://schemas.xmlsoap.org/",
    "http://www.w3.org/",
    "http://xml.apache.org/",
];

/// SOAP binding style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStyle {
    /// Parameters are encoded as flat parts wrapped in an operation element
    Rpc,
    /// The body carries a single schema-typed document element
    Document,
}

impl fmt::Display for BindingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingStyle::Rpc => write!(f, "rpc"),
            BindingStyle::Document => write!(f, "document"),
        }
    }
}

/// `use` attribute of a message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyUse {
    /// Literal parameters
    #[default]
    Literal,
    /// SOAP-encoded parameters
    Encoded,
}

/// One part of an RPC-style message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    /// Part name
    pub name: String,
    /// Qualified type name, e.g. `xsd:int`
    #[serde(rename = "type")]
    pub type_name: String,
}

impl MessagePart {
    /// Create a new message part
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Shape of an operation's input message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InputShape {
    /// Flat parts list, implying RPC-style encoding
    Parts {
        /// Message name
        name: String,
        /// Ordered parts
        parts: Vec<MessagePart>,
    },
    /// A single named document element
    Element {
        /// Element name
        name: String,
        /// Namespace URI of the element
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        /// Prefix bound to `namespace`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace_alias: Option<String>,
    },
}

impl InputShape {
    /// Message or element name
    pub fn name(&self) -> &str {
        match self {
            InputShape::Parts { name, .. } | InputShape::Element { name, .. } => name,
        }
    }

    /// Short label used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            InputShape::Parts { .. } => "parts",
            InputShape::Element { .. } => "element",
        }
    }
}

/// Shape of an operation's output message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputShape {
    /// Name used to locate the result in the response body
    pub name: String,
}

/// Schema-derived, immutable description of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Operation name
    pub name: String,
    /// Declared binding style, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<BindingStyle>,
    /// Explicit SOAPAction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soap_action: Option<String>,
    /// Input message shape
    pub input: InputShape,
    /// Encoding of the input body
    #[serde(default)]
    pub input_use: BodyUse,
    /// Output message shape
    pub output: OutputShape,
}

impl OperationDescriptor {
    /// RPC-style operation with the given parts
    pub fn rpc(
        name: impl Into<String>,
        parts: Vec<MessagePart>,
        output: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            input: InputShape::Parts {
                name: name.clone(),
                parts,
            },
            name,
            style: Some(BindingStyle::Rpc),
            soap_action: None,
            input_use: BodyUse::Literal,
            output: OutputShape {
                name: output.into(),
            },
        }
    }

    /// Document-style operation whose input is a single element
    pub fn document(
        name: impl Into<String>,
        element: impl Into<String>,
        namespace: Option<String>,
        namespace_alias: Option<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            style: Some(BindingStyle::Document),
            soap_action: None,
            input: InputShape::Element {
                name: element.into(),
                namespace,
                namespace_alias,
            },
            input_use: BodyUse::Literal,
            output: OutputShape {
                name: output.into(),
            },
        }
    }

    /// Set the explicit SOAPAction
    pub fn with_soap_action(mut self, action: impl Into<String>) -> Self {
        self.soap_action = Some(action.into());
        self
    }

    /// Override the declared style
    pub fn with_style(mut self, style: Option<BindingStyle>) -> Self {
        self.style = style;
        self
    }

    /// Set the input body encoding
    pub fn with_input_use(mut self, input_use: BodyUse) -> Self {
        self.input_use = input_use;
        self
    }
}

/// A binding: the set of operations reachable through a port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDefinition {
    /// Binding name
    pub name: String,
    /// Operations keyed by name
    #[serde(default)]
    pub operations: BTreeMap<String, OperationDescriptor>,
}

/// A port: a binding exposed at an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDefinition {
    /// Declared address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Binding used by the port
    pub binding: BindingDefinition,
}

/// A service: a named group of ports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Ports keyed by name
    #[serde(default)]
    pub ports: BTreeMap<String, PortDefinition>,
}

/// Parsed service description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Target namespace of the description
    pub target_namespace: String,
    /// Namespace-prefix table (alias -> URI)
    #[serde(default)]
    pub xmlns: BTreeMap<String, String>,
    /// Services keyed by name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDefinition>,
}

/// Operation summary returned by [`SchemaDefinition::describe`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSummary {
    /// Input description: part name -> type, or the element name
    pub input: Value,
    /// Output message name
    pub output: String,
}

/// service -> port -> operation -> summary
pub type ServicesDescription =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, OperationSummary>>>;

impl SchemaDefinition {
    /// Create an empty description for `target_namespace`
    pub fn new(target_namespace: impl Into<String>) -> Self {
        Self {
            target_namespace: target_namespace.into(),
            ..Default::default()
        }
    }

    /// Bind a namespace alias
    pub fn with_namespace(mut self, alias: impl Into<String>, uri: impl Into<String>) -> Self {
        self.xmlns.insert(alias.into(), uri.into());
        self
    }

    /// Add a port to a service, creating the service when needed
    pub fn with_port(
        mut self,
        service: impl Into<String>,
        port: impl Into<String>,
        definition: PortDefinition,
    ) -> Self {
        self.services
            .entry(service.into())
            .or_default()
            .ports
            .insert(port.into(), definition);
        self
    }

    /// First named alias bound to `namespace`
    ///
    /// The default namespace and the internal target-namespace alias are not
    /// usable as element prefixes and are skipped.
    pub fn alias_for(&self, namespace: &str) -> Option<&str> {
        self.xmlns
            .iter()
            .filter(|(alias, _)| !alias.is_empty() && alias.as_str() != TNS_PREFIX)
            .find(|(_, uri)| uri.as_str() == namespace)
            .map(|(alias, _)| alias.as_str())
    }

    /// Namespace declarations to place on the envelope root
    ///
    /// Each entry renders as ` xmlns:alias="uri"` (leading space included).
    pub fn envelope_namespace_decls(&self) -> String {
        let mut decls = String::new();
        for (alias, uri) in &self.xmlns {
            if alias.is_empty() || alias == TNS_PREFIX {
                continue;
            }
            if SKIPPED_NAMESPACES.contains(&uri.as_str())
                || SKIPPED_NAMESPACE_PREFIXES
                    .iter()
                    .any(|prefix| uri.starts_with(prefix))
            {
                continue;
            }
            decls.push_str(&format!(" xmlns:{alias}=\"{uri}\""));
        }
        decls
    }

    /// Summarize the services for introspection
    pub fn describe(&self) -> ServicesDescription {
        self.services
            .iter()
            .map(|(service_name, service)| {
                let ports = service
                    .ports
                    .iter()
                    .map(|(port_name, port)| {
                        let operations = port
                            .binding
                            .operations
                            .iter()
                            .map(|(op_name, op)| (op_name.clone(), summarize(op)))
                            .collect();
                        (port_name.clone(), operations)
                    })
                    .collect();
                (service_name.clone(), ports)
            })
            .collect()
    }

    /// Total number of operations across all services and ports
    pub fn operation_count(&self) -> usize {
        self.services
            .values()
            .flat_map(|service| service.ports.values())
            .map(|port| port.binding.operations.len())
            .sum()
    }
}

fn summarize(op: &OperationDescriptor) -> OperationSummary {
    let input = match &op.input {
        InputShape::Parts { parts, .. } => Value::Object(
            parts
                .iter()
                .map(|part| (part.name.clone(), Value::String(part.type_name.clone())))
                .collect(),
        ),
        InputShape::Element { name, namespace, .. } => json!({
            "element": name,
            "namespace": namespace,
        }),
    };
    OperationSummary {
        input,
        output: op.output.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_schema() -> SchemaDefinition {
        let mut binding = BindingDefinition {
            name: "StockQuoteBinding".to_string(),
            ..Default::default()
        };
        binding.operations.insert(
            "GetLastTradePrice".to_string(),
            OperationDescriptor::rpc(
                "GetLastTradePrice",
                vec![MessagePart::new("tickerSymbol", "xsd:string")],
                "GetLastTradePriceResponse",
            ),
        );
        SchemaDefinition::new("http://example.com/stockquote")
            .with_namespace("tns", "http://example.com/stockquote")
            .with_namespace("xsd", "http://www.w3.org/2001/XMLSchema")
            .with_namespace("soap", "http://schemas.xmlsoap.org/wsdl/soap/")
            .with_namespace(TNS_PREFIX, "http://example.com/stockquote")
            .with_namespace("types", "urn:example:types")
            .with_port(
                "StockQuoteService",
                "StockQuotePort",
                PortDefinition {
                    location: Some("http://example.com/stockquote".to_string()),
                    binding,
                },
            )
    }

    #[test]
    fn test_alias_for_target_namespace() {
        let schema = stock_schema();
        assert_eq!(schema.alias_for("http://example.com/stockquote"), Some("tns"));
        assert_eq!(schema.alias_for("urn:missing"), None);
    }

    #[test]
    fn test_envelope_namespace_decls_skip_well_known() {
        let schema = stock_schema();
        assert_eq!(
            schema.envelope_namespace_decls(),
            " xmlns:tns=\"http://example.com/stockquote\" xmlns:types=\"urn:example:types\""
        );
    }

    #[test]
    fn test_describe_lists_parts() {
        let description = stock_schema().describe();
        let op = &description["StockQuoteService"]["StockQuotePort"]["GetLastTradePrice"];
        assert_eq!(op.input, json!({"tickerSymbol": "xsd:string"}));
        assert_eq!(op.output, "GetLastTradePriceResponse");
    }

    #[test]
    fn test_schema_json_roundtrip_preserves_shape() {
        let schema = stock_schema();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("\"kind\":\"parts\""));
        let parsed: SchemaDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.operation_count(), 1);
        assert_eq!(parsed, schema);
    }
}
