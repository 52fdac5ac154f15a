// ! Operation dispatcher
// !
// ! Runs one call end to end: style validation, body marshalling, SOAPAction
// ! resolution, security augmentation, envelope assembly, the exchange, and
// ! payload extraction from the decoded response.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{Instrument, debug, warn};

use crate::client::config::{ClientConfig, SoapActionResolver};
use crate::core::error::{SoapError, SoapResult};
use crate::core::logging::{ErrorContext, ErrorLogger};
use crate::protocol::envelope::{assemble, encoding_style_decl};
use crate::protocol::schema::{
    BindingStyle, BodyUse, InputShape, OperationDescriptor, SchemaDefinition,
};
use crate::protocol::xml::{Marshaller, SoapFault};
use crate::transport::traits::{Transport, TransportOptions, TransportResponse};

/// Content type sent with every envelope
pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Suffixes stripped from the output name, longest first
const OUTPUT_SUFFIXES: &[&str] = &["Response", "Output", "Out"];

/// Arguments for one call
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    /// Argument tree handed to the marshaller
    Structured(Value),
    /// Pre-built body XML, sent verbatim
    Raw(String),
}

impl From<Value> for CallArgs {
    fn from(value: Value) -> Self {
        CallArgs::Structured(value)
    }
}

impl From<String> for CallArgs {
    fn from(xml: String) -> Self {
        CallArgs::Raw(xml)
    }
}

impl From<&str> for CallArgs {
    fn from(xml: &str) -> Self {
        CallArgs::Raw(xml.to_string())
    }
}

/// Outcome of a successful exchange
#[derive(Debug, Clone)]
pub struct CallResult {
    /// Extracted payload; `None` when no output element matched
    pub payload: Option<Value>,
    /// Raw response body
    pub raw_body: String,
    /// Full transport response
    pub response: TransportResponse,
}

/// Most recent request and response seen by any call
///
/// Concurrent calls overwrite each other; the values are for inspection only.
#[derive(Debug, Default)]
pub struct Diagnostics {
    last_request: RwLock<Option<String>>,
    last_response: RwLock<Option<String>>,
    last_response_headers: RwLock<Option<HashMap<String, String>>>,
}

impl Diagnostics {
    async fn record_request(&self, envelope: &str) {
        *self.last_request.write().await = Some(envelope.to_string());
        *self.last_response.write().await = None;
        *self.last_response_headers.write().await = None;
    }

    async fn record_response(&self, response: &TransportResponse) {
        *self.last_response.write().await = Some(response.body.clone());
        *self.last_response_headers.write().await = Some(response.headers.clone());
    }

    /// Last envelope sent
    pub async fn last_request(&self) -> Option<String> {
        self.last_request.read().await.clone()
    }

    /// Last raw response body received
    pub async fn last_response(&self) -> Option<String> {
        self.last_response.read().await.clone()
    }

    /// Headers of the last response received
    pub async fn last_response_headers(&self) -> Option<HashMap<String, String>> {
        self.last_response_headers.read().await.clone()
    }
}

/// Executes calls against one bound schema
pub struct OperationDispatcher {
    schema: Arc<SchemaDefinition>,
    namespace_decls: String,
    marshaller: Arc<dyn Marshaller>,
    transport: Arc<dyn Transport>,
    diagnostics: Arc<Diagnostics>,
}

impl OperationDispatcher {
    /// Create a dispatcher for `schema`
    pub fn new(
        schema: Arc<SchemaDefinition>,
        marshaller: Arc<dyn Marshaller>,
        transport: Arc<dyn Transport>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        let namespace_decls = schema.envelope_namespace_decls();
        Self {
            schema,
            namespace_decls,
            marshaller,
            transport,
            diagnostics,
        }
    }

    /// Schema this dispatcher serves
    pub fn schema(&self) -> &Arc<SchemaDefinition> {
        &self.schema
    }

    /// Run one call
    ///
    /// `config` is a snapshot taken by the caller; `overlay` wins over the
    /// configured transport headers and timeout.
    pub async fn dispatch(
        &self,
        descriptor: &OperationDescriptor,
        args: CallArgs,
        address: &str,
        config: &ClientConfig,
        overlay: TransportOptions,
    ) -> SoapResult<CallResult> {
        let context = ErrorContext::new(descriptor.name.as_str())
            .with_transport(self.transport.name())
            .with_address(address);
        let span = ErrorLogger::create_operation_span(&descriptor.name, &context);

        let result = self
            .run(descriptor, args, address, config, overlay)
            .instrument(span)
            .await;
        if let Err(err) = &result {
            err.log_with_context(&context);
        }
        result
    }

    async fn run(
        &self,
        descriptor: &OperationDescriptor,
        args: CallArgs,
        address: &str,
        config: &ClientConfig,
        overlay: TransportOptions,
    ) -> SoapResult<CallResult> {
        let style = validate_style(descriptor).inspect_err(|_| {
            warn!(
                operation = descriptor.name.as_str(),
                "Binding style conflicts with input shape, call not attempted"
            );
        })?;

        let body = match args {
            CallArgs::Raw(xml) => xml,
            CallArgs::Structured(value) => self.marshal_body(descriptor, &value)?,
        };

        let soap_action = resolve_soap_action(
            config.soap_action_resolver.as_ref(),
            &self.schema.target_namespace,
            descriptor,
        );
        debug!(soap_action = soap_action.as_str(), style = %style, "Resolved SOAPAction");

        let mut base = TransportOptions {
            timeout: config.timeout,
            ..Default::default()
        };
        base.extend_headers(config.http_headers.clone());
        let mut options = base.merge(overlay);
        options.set_header("SOAPAction", format!("\"{soap_action}\""));
        options.set_header("Content-Type", CONTENT_TYPE);

        let mut fragments = Vec::with_capacity(config.soap_headers.len() + 1);
        if let Some(security) = &config.security {
            let mut security_headers = HashMap::new();
            security.add_headers(&mut security_headers);
            options.extend_headers(security_headers);
            security.add_options(&mut options);
            let fragment = security.to_xml();
            if !fragment.is_empty() {
                fragments.push(fragment);
            }
        }
        fragments.extend(config.soap_headers.iter().cloned());

        let encoding = (style == BindingStyle::Rpc && descriptor.input_use == BodyUse::Encoded)
            .then(encoding_style_decl);
        let envelope = assemble(
            &body,
            &fragments,
            &self.namespace_decls,
            encoding.as_deref(),
        );

        self.diagnostics.record_request(&envelope).await;
        debug!(address = address, envelope_len = envelope.len(), "Dispatching envelope");

        let response = self.transport.exchange(address, envelope, &options).await?;
        self.diagnostics.record_response(&response).await;

        let parsed = match self.marshaller.from_xml(&response.body) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(status = response.status, "Response body is not a SOAP envelope");
                return Err(SoapError::decode(err.to_string(), response));
            }
        };

        let body = parsed.get("Body");
        if let Some(fault) = body.and_then(|b| b.get("Fault")) {
            return Err(SoapError::Fault {
                fault: Box::new(SoapFault::from_value(fault)),
                body: response.body,
            });
        }

        let payload = body.and_then(|b| extract_payload(b, &descriptor.output.name));
        if payload.is_none() {
            debug!(
                output = descriptor.output.name.as_str(),
                "No output element matched; returning raw body only"
            );
        }

        Ok(CallResult {
            payload,
            raw_body: response.body.clone(),
            response,
        })
    }

    fn marshal_body(&self, descriptor: &OperationDescriptor, args: &Value) -> SoapResult<String> {
        match &descriptor.input {
            InputShape::Parts { .. } => {
                let namespace = self.schema.target_namespace.as_str();
                let alias = self.schema.alias_for(namespace);
                self.marshaller
                    .to_rpc_xml(&descriptor.name, args, alias, namespace)
            }
            InputShape::Element {
                name,
                namespace,
                namespace_alias,
            } => {
                let alias = namespace_alias.as_deref().or_else(|| {
                    namespace
                        .as_deref()
                        .and_then(|ns| self.schema.alias_for(ns))
                });
                self.marshaller
                    .to_document_xml(name, args, alias, namespace.as_deref())
            }
        }
    }
}

/// Effective style of `descriptor`, or a mismatch error
///
/// A parts list implies RPC and a document element implies document style;
/// an explicitly declared style must agree.
pub fn validate_style(descriptor: &OperationDescriptor) -> SoapResult<BindingStyle> {
    let implied = match descriptor.input {
        InputShape::Parts { .. } => BindingStyle::Rpc,
        InputShape::Element { .. } => BindingStyle::Document,
    };
    match descriptor.style {
        Some(declared) if declared != implied => Err(SoapError::StyleMismatch {
            operation: descriptor.name.clone(),
            style: declared,
            input: descriptor.input.kind(),
        }),
        _ => Ok(implied),
    }
}

/// Resolve the SOAPAction (unquoted)
///
/// Priority: resolver, explicit action on the descriptor, then
/// `namespace + "/" + operation` without doubling the slash.
pub fn resolve_soap_action(
    resolver: Option<&SoapActionResolver>,
    target_namespace: &str,
    descriptor: &OperationDescriptor,
) -> String {
    if let Some(resolver) = resolver {
        return (**resolver)(target_namespace, &descriptor.name);
    }
    if let Some(action) = &descriptor.soap_action {
        return action.clone();
    }
    if target_namespace.ends_with('/') {
        format!("{target_namespace}{}", descriptor.name)
    } else {
        format!("{target_namespace}/{}", descriptor.name)
    }
}

/// Output name with one trailing `Response`, `Output` or `Out` removed
pub fn strip_output_suffix(name: &str) -> Option<&str> {
    OUTPUT_SUFFIXES
        .iter()
        .filter_map(|suffix| name.strip_suffix(suffix))
        .find(|stripped| !stripped.is_empty())
}

/// Locate the payload in a decoded body
///
/// The exact output name wins; otherwise the suffix-stripped name is tried.
/// A null element counts as absent.
pub fn extract_payload(body: &Value, output_name: &str) -> Option<Value> {
    let lookup = |name: &str| body.get(name).filter(|value| !value.is_null()).cloned();
    lookup(output_name).or_else(|| strip_output_suffix(output_name).and_then(lookup))
}
