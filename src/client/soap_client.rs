// ! SOAP client facade
// !
// ! Owns the configuration and the lifecycle of one client. The client starts
// ! `Unbound`, becomes `Bound` once a schema is bound, and becomes `Failed`
// ! when acquiring or binding the first schema fails. `Failed` is terminal.
// !
// ! Rebinding (a new endpoint or a new schema on a bound client) builds a new
// ! callable tree off to the side and swaps it in only on success, so callers
// ! never observe a partially bound client. Calls already in flight keep the
// ! tree they started with.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{info, warn};

use crate::client::binder::{BoundOperation, ServiceBinder, ServiceBindings};
use crate::client::config::ClientConfig;
use crate::client::dispatcher::{CallArgs, CallResult, Diagnostics};
use crate::client::loader::SchemaLoader;
use crate::core::error::{SoapError, SoapResult};
use crate::core::logging::ErrorContext;
use crate::protocol::schema::{SchemaDefinition, ServicesDescription};
use crate::protocol::xml::{Marshaller, XmlMarshaller};
use crate::security::SecurityStrategy;
use crate::transport::traits::{Transport, TransportOptions, insert_header};

/// Lifecycle state of a [`SoapClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// No schema bound yet
    Unbound,
    /// Schema bound, operations callable
    Bound,
    /// Schema acquisition or binding failed; terminal
    Failed(String),
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Unbound => write!(f, "unbound"),
            ClientState::Bound => write!(f, "bound"),
            ClientState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A SOAP envelope header added by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum SoapHeader {
    /// Pre-built XML fragment
    Xml(String),
    /// Object marshalled into a fragment
    Object {
        /// Header content
        value: Value,
        /// Wrapping element name; the object is rendered bare when `None`
        name: Option<String>,
        /// Namespace prefix of the wrapping element
        namespace_alias: Option<String>,
        /// Namespace URI of the wrapping element
        namespace: Option<String>,
    },
}

impl SoapHeader {
    /// Object header wrapped in `name`
    pub fn object(value: Value, name: impl Into<String>) -> Self {
        SoapHeader::Object {
            value,
            name: Some(name.into()),
            namespace_alias: None,
            namespace: None,
        }
    }

    /// Qualify the wrapping element; has no effect on XML headers
    pub fn with_namespace(mut self, alias: impl Into<String>, uri: impl Into<String>) -> Self {
        if let SoapHeader::Object {
            namespace_alias,
            namespace,
            ..
        } = &mut self
        {
            *namespace_alias = Some(alias.into());
            *namespace = Some(uri.into());
        }
        self
    }
}

impl From<String> for SoapHeader {
    fn from(xml: String) -> Self {
        SoapHeader::Xml(xml)
    }
}

impl From<&str> for SoapHeader {
    fn from(xml: &str) -> Self {
        SoapHeader::Xml(xml.to_string())
    }
}

impl From<Value> for SoapHeader {
    fn from(value: Value) -> Self {
        SoapHeader::Object {
            value,
            name: None,
            namespace_alias: None,
            namespace: None,
        }
    }
}

/// A schema and the callable tree built from it, swapped as one unit
#[derive(Clone)]
struct BoundSchema {
    schema: Arc<SchemaDefinition>,
    bindings: Arc<ServiceBindings>,
}

/// SOAP client facade
pub struct SoapClient {
    config: Arc<RwLock<ClientConfig>>,
    marshaller: Arc<dyn Marshaller>,
    diagnostics: Arc<Diagnostics>,
    binder: ServiceBinder,
    bound: RwLock<Option<BoundSchema>>,
    bind_lock: Mutex<()>,
    state_tx: watch::Sender<ClientState>,
}

impl SoapClient {
    /// Create an unbound client over `transport` with default configuration
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_parts(
            transport,
            Arc::new(XmlMarshaller::new()),
            ClientConfig::default(),
        )
    }

    /// Create an unbound client from its collaborators
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        marshaller: Arc<dyn Marshaller>,
        config: ClientConfig,
    ) -> Self {
        let config = Arc::new(RwLock::new(config));
        let diagnostics = Arc::new(Diagnostics::default());
        let binder = ServiceBinder::new(
            marshaller.clone(),
            transport,
            diagnostics.clone(),
            config.clone(),
        );
        let (state_tx, _) = watch::channel(ClientState::Unbound);

        Self {
            config,
            marshaller,
            diagnostics,
            binder,
            bound: RwLock::new(None),
            bind_lock: Mutex::new(()),
            state_tx,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        self.state_tx.borrow().clone()
    }

    /// Whether operations are callable
    pub fn is_ready(&self) -> bool {
        matches!(*self.state_tx.borrow(), ClientState::Bound)
    }

    /// Receive lifecycle changes
    ///
    /// `Bound` is published once; rebinds do not notify again.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state_tx.subscribe()
    }

    /// Wait until the client leaves `Unbound`
    pub async fn wait_ready(&self) -> SoapResult<()> {
        let mut rx = self.state_tx.subscribe();
        let state = rx
            .wait_for(|state| *state != ClientState::Unbound)
            .await
            .map_err(|_| SoapError::internal("Client state channel closed"))?
            .clone();
        match state {
            ClientState::Failed(reason) => Err(SoapError::not_ready(reason)),
            _ => Ok(()),
        }
    }

    /// Bind `schema` and make its operations callable
    ///
    /// On an unbound client a failure moves the client to `Failed`. On a
    /// bound client a failure leaves the previous schema and tree in place.
    pub async fn bind_schema(&self, schema: SchemaDefinition) -> SoapResult<()> {
        let _guard = self.bind_lock.lock().await;
        self.ensure_not_failed()?;

        let schema = Arc::new(schema);
        let endpoint = self.config.read().await.endpoint.clone();
        match self.binder.bind(schema.clone(), endpoint.as_deref()) {
            Ok(bindings) => {
                *self.bound.write().await = Some(BoundSchema {
                    schema,
                    bindings: Arc::new(bindings),
                });
                self.mark_bound();
                Ok(())
            }
            Err(err) => {
                self.handle_acquisition_error(&err, "bind_schema");
                Err(err)
            }
        }
    }

    /// Acquire a schema through `loader` and bind it
    pub async fn load(&self, loader: &dyn SchemaLoader, source: &str) -> SoapResult<()> {
        self.ensure_not_failed()?;
        match loader.load(source).await {
            Ok(schema) => self.bind_schema(schema).await,
            Err(err) => {
                let _guard = self.bind_lock.lock().await;
                self.handle_acquisition_error(&err, "load");
                Err(err)
            }
        }
    }

    /// Override the address of every port
    ///
    /// A bound client is rebound at once. If the new address does not bind,
    /// the error is returned and the previous endpoint stays in effect.
    pub async fn set_endpoint(&self, endpoint: impl Into<String>) -> SoapResult<()> {
        let endpoint = endpoint.into();
        let _guard = self.bind_lock.lock().await;

        let schema = self
            .bound
            .read()
            .await
            .as_ref()
            .map(|bound| bound.schema.clone());
        if let (Some(schema), ClientState::Bound) = (schema, self.state()) {
            let bindings = self.binder.bind(schema, Some(&endpoint)).inspect_err(|err| {
                err.log_with_context(
                    &ErrorContext::new("set_endpoint").with_address(endpoint.as_str()),
                );
            })?;
            if let Some(bound) = self.bound.write().await.as_mut() {
                bound.bindings = Arc::new(bindings);
            }
            info!(endpoint = endpoint.as_str(), "Client rebound to new endpoint");
        }

        self.config.write().await.endpoint = Some(endpoint);
        Ok(())
    }

    /// Current endpoint override
    pub async fn endpoint(&self) -> Option<String> {
        self.config.read().await.endpoint.clone()
    }

    /// Install a security strategy for subsequent calls
    pub async fn set_security(&self, strategy: Arc<dyn SecurityStrategy>) {
        info!(strategy = strategy.name(), "Security strategy set");
        self.config.write().await.security = Some(strategy);
    }

    /// Remove the security strategy
    pub async fn clear_security(&self) {
        self.config.write().await.security = None;
    }

    /// Override SOAPAction resolution with `resolver(namespace, operation)`
    pub async fn set_soap_action_resolver<F>(&self, resolver: F)
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.config.write().await.soap_action_resolver = Some(Arc::new(resolver));
    }

    /// Add a transport header sent with every call
    pub async fn add_http_header(&self, name: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.config.write().await.http_headers, name, value);
    }

    /// Append an envelope header; returns its index
    ///
    /// Headers appear in the envelope in the order added, after the security
    /// header. A call already in flight may or may not see a header added
    /// concurrently.
    pub async fn add_soap_header(&self, header: impl Into<SoapHeader>) -> SoapResult<usize> {
        let fragment = match header.into() {
            SoapHeader::Xml(xml) => xml,
            SoapHeader::Object {
                value,
                name,
                namespace_alias,
                namespace,
            } => self.marshaller.object_to_xml(
                &value,
                name.as_deref(),
                namespace_alias.as_deref(),
                namespace.as_deref(),
            )?,
        };

        let mut config = self.config.write().await;
        config.soap_headers.push(fragment);
        Ok(config.soap_headers.len() - 1)
    }

    /// Envelope headers in insertion order
    pub async fn soap_headers(&self) -> Vec<String> {
        self.config.read().await.soap_headers.clone()
    }

    /// Remove every envelope header
    pub async fn clear_soap_headers(&self) {
        self.config.write().await.soap_headers.clear();
    }

    /// Description of the bound schema, `None` unless `Bound`
    pub async fn describe_services(&self) -> Option<ServicesDescription> {
        if !self.is_ready() {
            return None;
        }
        self.bound
            .read()
            .await
            .as_ref()
            .map(|bound| bound.schema.describe())
    }

    /// Snapshot of the current callable tree
    pub async fn bindings(&self) -> SoapResult<Arc<ServiceBindings>> {
        if let ClientState::Failed(reason) = self.state() {
            return Err(SoapError::not_ready(format!("client failed: {reason}")));
        }
        self.bound
            .read()
            .await
            .as_ref()
            .map(|bound| bound.bindings.clone())
            .ok_or_else(|| SoapError::not_ready("no schema bound"))
    }

    /// Look up an operation by name or `service.port.operation`
    pub async fn operation(&self, name: &str) -> SoapResult<BoundOperation> {
        self.bindings()
            .await?
            .get(name)
            .cloned()
            .ok_or_else(|| SoapError::OperationNotFound(name.to_string()))
    }

    /// Look up an operation by its qualified path
    pub async fn operation_at(
        &self,
        service: &str,
        port: &str,
        operation: &str,
    ) -> SoapResult<BoundOperation> {
        self.bindings()
            .await?
            .get_at(service, port, operation)
            .cloned()
            .ok_or_else(|| {
                SoapError::OperationNotFound(format!("{service}.{port}.{operation}"))
            })
    }

    /// Call an operation by name or qualified path
    pub async fn call(
        &self,
        name: &str,
        args: impl Into<CallArgs>,
        options: Option<TransportOptions>,
    ) -> SoapResult<CallResult> {
        self.operation(name).await?.call(args, options).await
    }

    /// Last envelope sent by any call
    pub async fn last_request(&self) -> Option<String> {
        self.diagnostics.last_request().await
    }

    /// Last raw response body received by any call
    pub async fn last_response(&self) -> Option<String> {
        self.diagnostics.last_response().await
    }

    /// Headers of the last response received by any call
    pub async fn last_response_headers(&self) -> Option<HashMap<String, String>> {
        self.diagnostics.last_response_headers().await
    }

    fn ensure_not_failed(&self) -> SoapResult<()> {
        match self.state() {
            ClientState::Failed(reason) => {
                Err(SoapError::not_ready(format!("client failed: {reason}")))
            }
            _ => Ok(()),
        }
    }

    fn mark_bound(&self) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == ClientState::Bound {
                false
            } else {
                *state = ClientState::Bound;
                true
            }
        });
        if changed {
            info!("SOAP client ready");
        } else {
            info!("SOAP client rebound");
        }
    }

    fn handle_acquisition_error(&self, err: &SoapError, operation: &str) {
        err.log_with_context(&ErrorContext::new(operation));
        if self.state() == ClientState::Unbound {
            warn!(error = %err, "Schema acquisition failed, client is unusable");
            self.state_tx.send_replace(ClientState::Failed(err.to_string()));
        }
    }
}

impl fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::schema::{BindingDefinition, MessagePart, OperationDescriptor, PortDefinition};
    use crate::transport::traits::TransportResponse;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn exchange(
            &self,
            _address: &str,
            _body: String,
            _options: &TransportOptions,
        ) -> SoapResult<TransportResponse> {
            Ok(TransportResponse {
                status: 200,
                body: "<Envelope><Body><PingResponse>ok</PingResponse></Body></Envelope>"
                    .to_string(),
                ..Default::default()
            })
        }
    }

    fn schema() -> SchemaDefinition {
        schema_with("Ping")
    }

    fn schema_with(operation: &str) -> SchemaDefinition {
        let mut operations = std::collections::BTreeMap::new();
        operations.insert(
            operation.to_string(),
            OperationDescriptor::rpc(
                operation,
                vec![MessagePart::new("n", "xsd:int")],
                format!("{operation}Response"),
            ),
        );
        SchemaDefinition::new("http://x/y").with_port(
            "Svc",
            "Port",
            PortDefinition {
                location: Some("http://a.local/soap".to_string()),
                binding: BindingDefinition {
                    name: "B".to_string(),
                    operations,
                },
            },
        )
    }

    #[tokio::test]
    async fn test_unbound_client() {
        let client = SoapClient::new(Arc::new(EchoTransport));
        assert_eq!(client.state(), ClientState::Unbound);
        assert!(client.describe_services().await.is_none());
        assert_eq!(client.operation("Ping").await.unwrap_err().category(), "lifecycle");
    }

    #[tokio::test]
    async fn test_bind_and_call() {
        let client = SoapClient::new(Arc::new(EchoTransport));
        client.bind_schema(schema()).await.unwrap();
        client.wait_ready().await.unwrap();

        let result = client.call("Ping", json!({"n": 1}), None).await.unwrap();
        assert_eq!(result.payload, Some(json!("ok")));
        assert!(client.describe_services().await.unwrap()["Svc"]["Port"].contains_key("Ping"));
    }

    #[tokio::test]
    async fn test_schema_rebind_swaps_description_and_tree_together() {
        let client = Arc::new(SoapClient::new(Arc::new(EchoTransport)));
        client.bind_schema(schema()).await.unwrap();

        let reader = {
            let client = client.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let bound = client.bound.read().await.clone();
                    if let Some(bound) = bound {
                        let described: Vec<String> = bound.schema.describe()["Svc"]["Port"]
                            .keys()
                            .cloned()
                            .collect();
                        let bound_names: Vec<String> = bound
                            .bindings
                            .operation_names()
                            .into_iter()
                            .map(str::to_string)
                            .collect();
                        assert_eq!(described, bound_names);
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for i in 0..50 {
            let name = if i % 2 == 0 { "Pong" } else { "Ping" };
            client.bind_schema(schema_with(name)).await.unwrap();
            tokio::task::yield_now().await;
        }
        reader.await.unwrap();

        let description = client.describe_services().await.unwrap();
        assert!(description["Svc"]["Port"].contains_key("Ping"));
        assert_eq!(client.bindings().await.unwrap().operation_names(), vec!["Ping"]);
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let client = SoapClient::new(Arc::new(EchoTransport));
        let err = client
            .bind_schema(SchemaDefinition::new("http://x/y"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "binding");
        assert!(matches!(client.state(), ClientState::Failed(_)));
        assert!(client.wait_ready().await.is_err());

        let err = client.bind_schema(schema()).await.unwrap_err();
        assert_eq!(err.category(), "lifecycle");
        assert!(client.describe_services().await.is_none());
    }

    #[tokio::test]
    async fn test_object_soap_header() {
        let client = SoapClient::new(Arc::new(EchoTransport));
        let index = client
            .add_soap_header(
                SoapHeader::object(json!({"token": "abc"}), "Auth").with_namespace("h", "urn:h"),
            )
            .await
            .unwrap();
        assert_eq!(index, 0);
        assert_eq!(
            client.soap_headers().await,
            vec!["<h:Auth xmlns:h=\"urn:h\"><token>abc</token></h:Auth>".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ready_published_once() {
        let client = SoapClient::new(Arc::new(EchoTransport));
        let mut rx = client.subscribe();
        client.bind_schema(schema()).await.unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        client.set_endpoint("http://b.local/soap").await.unwrap();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(
            client.operation("Ping").await.unwrap().address(),
            "http://b.local/soap"
        );
    }
}
