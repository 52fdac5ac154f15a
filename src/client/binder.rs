// ! Service binder
// !
// ! Walks service -> port -> binding -> operation and produces one callable
// ! per operation, each fixed to the address resolved at bind time. Binding
// ! is all-or-nothing: either every port resolves or no tree is returned.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::client::config::ClientConfig;
use crate::client::dispatcher::{CallArgs, CallResult, Diagnostics, OperationDispatcher};
use crate::core::error::{SoapError, SoapResult};
use crate::protocol::schema::{OperationDescriptor, SchemaDefinition};
use crate::protocol::xml::Marshaller;
use crate::transport::traits::{Transport, TransportOptions};

/// A callable operation fixed to one address
#[derive(Clone)]
pub struct BoundOperation {
    name: String,
    service: String,
    port: String,
    address: String,
    descriptor: Arc<OperationDescriptor>,
    dispatcher: Arc<OperationDispatcher>,
    config: Arc<RwLock<ClientConfig>>,
}

impl BoundOperation {
    /// Operation name as keyed in the binding
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service the operation belongs to
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Port the operation belongs to
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Address resolved at bind time
    pub fn address(&self) -> &str {
        &self.address
    }

    /// `service.port.operation`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.service, self.port, self.name)
    }

    /// Schema-derived descriptor
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Invoke the operation
    ///
    /// Client configuration (security, headers, SOAP headers) is read once
    /// when the call starts. `options` overlays the configured transport
    /// headers and timeout.
    pub async fn call(
        &self,
        args: impl Into<CallArgs>,
        options: Option<TransportOptions>,
    ) -> SoapResult<CallResult> {
        let config = self.config.read().await.clone();
        self.dispatcher
            .dispatch(
                &self.descriptor,
                args.into(),
                &self.address,
                &config,
                options.unwrap_or_default(),
            )
            .await
    }
}

impl fmt::Debug for BoundOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundOperation")
            .field("operation", &self.qualified_name())
            .field("address", &self.address)
            .finish()
    }
}

type PortOperations = BTreeMap<String, BoundOperation>;

/// Immutable callable tree produced by one bind
#[derive(Debug, Clone, Default)]
pub struct ServiceBindings {
    tree: BTreeMap<String, BTreeMap<String, PortOperations>>,
    aliases: BTreeMap<String, BoundOperation>,
}

impl ServiceBindings {
    /// Look up by operation name or by `service.port.operation`
    ///
    /// A bare name that exists on several ports resolves to the last port in
    /// service/port name order.
    pub fn get(&self, name: &str) -> Option<&BoundOperation> {
        if let Some(operation) = self.aliases.get(name) {
            return Some(operation);
        }
        let mut path = name.splitn(3, '.');
        match (path.next(), path.next(), path.next()) {
            (Some(service), Some(port), Some(operation)) => self.get_at(service, port, operation),
            _ => None,
        }
    }

    /// Look up by fully qualified path
    pub fn get_at(&self, service: &str, port: &str, operation: &str) -> Option<&BoundOperation> {
        self.tree.get(service)?.get(port)?.get(operation)
    }

    /// Distinct operation names exposed at the top level
    pub fn operation_names(&self) -> Vec<&str> {
        self.aliases.keys().map(String::as_str).collect()
    }

    /// Every `service.port.operation` path
    pub fn qualified_names(&self) -> Vec<String> {
        self.iter().map(BoundOperation::qualified_name).collect()
    }

    /// All bound operations in service/port/operation order
    pub fn iter(&self) -> impl Iterator<Item = &BoundOperation> {
        self.tree
            .values()
            .flat_map(|ports| ports.values())
            .flat_map(|operations| operations.values())
    }

    /// Number of bound operations
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether nothing was bound
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Produces [`ServiceBindings`] for a schema
pub struct ServiceBinder {
    marshaller: Arc<dyn Marshaller>,
    transport: Arc<dyn Transport>,
    diagnostics: Arc<Diagnostics>,
    config: Arc<RwLock<ClientConfig>>,
}

impl ServiceBinder {
    /// Create a binder sharing the client's collaborators and configuration
    pub fn new(
        marshaller: Arc<dyn Marshaller>,
        transport: Arc<dyn Transport>,
        diagnostics: Arc<Diagnostics>,
        config: Arc<RwLock<ClientConfig>>,
    ) -> Self {
        Self {
            marshaller,
            transport,
            diagnostics,
            config,
        }
    }

    /// Bind every operation of `schema`
    ///
    /// `endpoint`, when set, replaces every port's declared address.
    pub fn bind(
        &self,
        schema: Arc<SchemaDefinition>,
        endpoint: Option<&str>,
    ) -> SoapResult<ServiceBindings> {
        if schema.services.is_empty() {
            return Err(SoapError::binding("Schema declares no services"));
        }

        let dispatcher = Arc::new(OperationDispatcher::new(
            schema.clone(),
            self.marshaller.clone(),
            self.transport.clone(),
            self.diagnostics.clone(),
        ));

        let mut bindings = ServiceBindings::default();
        for (service_name, service) in &schema.services {
            let ports = bindings.tree.entry(service_name.clone()).or_default();
            for (port_name, port) in &service.ports {
                let address = resolve_address(
                    endpoint,
                    port.location.as_deref(),
                    service_name,
                    port_name,
                )?;

                let operations = ports.entry(port_name.clone()).or_default();
                for (op_name, descriptor) in &port.binding.operations {
                    let bound = BoundOperation {
                        name: op_name.clone(),
                        service: service_name.clone(),
                        port: port_name.clone(),
                        address: address.clone(),
                        descriptor: Arc::new(descriptor.clone()),
                        dispatcher: dispatcher.clone(),
                        config: self.config.clone(),
                    };
                    debug!(operation = %bound.qualified_name(), address = address.as_str(), "Bound operation");
                    bindings.aliases.insert(op_name.clone(), bound.clone());
                    operations.insert(op_name.clone(), bound);
                }
            }
        }

        info!(
            services = schema.services.len(),
            operations = bindings.len(),
            endpoint_override = endpoint.is_some(),
            "Schema bound"
        );
        Ok(bindings)
    }
}

fn resolve_address(
    endpoint: Option<&str>,
    location: Option<&str>,
    service: &str,
    port: &str,
) -> SoapResult<String> {
    let address = endpoint.or(location).ok_or_else(|| {
        SoapError::binding(format!(
            "Port '{service}.{port}' has no address and no endpoint override is set"
        ))
    })?;
    Url::parse(address).map_err(|e| {
        SoapError::binding(format!(
            "Invalid address '{address}' for port '{service}.{port}': {e}"
        ))
    })?;
    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::schema::{BindingDefinition, MessagePart, PortDefinition};
    use crate::protocol::xml::XmlMarshaller;
    use crate::transport::traits::TransportResponse;
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn exchange(
            &self,
            _address: &str,
            _body: String,
            _options: &TransportOptions,
        ) -> SoapResult<TransportResponse> {
            Err(SoapError::transport("unreachable"))
        }
    }

    fn port(location: Option<&str>, ops: &[&str]) -> PortDefinition {
        PortDefinition {
            location: location.map(String::from),
            binding: BindingDefinition {
                name: "Binding".to_string(),
                operations: ops
                    .iter()
                    .map(|op| {
                        (
                            op.to_string(),
                            OperationDescriptor::rpc(
                                *op,
                                vec![MessagePart::new("id", "xsd:int")],
                                format!("{op}Response"),
                            ),
                        )
                    })
                    .collect(),
            },
        }
    }

    fn binder() -> ServiceBinder {
        ServiceBinder::new(
            Arc::new(XmlMarshaller::new()),
            Arc::new(NullTransport),
            Arc::new(Diagnostics::default()),
            Arc::new(RwLock::new(ClientConfig::default())),
        )
    }

    fn two_port_schema() -> Arc<SchemaDefinition> {
        Arc::new(
            SchemaDefinition::new("http://x/y")
                .with_port("Users", "Primary", port(Some("http://a.local/soap"), &["GetUser", "Ping"]))
                .with_port("Users", "Secondary", port(Some("http://b.local/soap"), &["Ping"])),
        )
    }

    #[test]
    fn test_binds_every_operation() {
        let bindings = binder().bind(two_port_schema(), None).unwrap();

        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings.operation_names(), vec!["GetUser", "Ping"]);
        assert_eq!(
            bindings.qualified_names(),
            vec![
                "Users.Primary.GetUser",
                "Users.Primary.Ping",
                "Users.Secondary.Ping"
            ]
        );
        assert_eq!(
            bindings.get("GetUser").unwrap().address(),
            "http://a.local/soap"
        );
    }

    #[test]
    fn test_collision_keeps_qualified_paths() {
        let bindings = binder().bind(two_port_schema(), None).unwrap();

        // Last port in name order wins the bare alias
        assert_eq!(bindings.get("Ping").unwrap().port(), "Secondary");
        assert_eq!(
            bindings.get("Users.Primary.Ping").unwrap().address(),
            "http://a.local/soap"
        );
        assert_eq!(
            bindings.get_at("Users", "Secondary", "Ping").unwrap().address(),
            "http://b.local/soap"
        );
        assert!(bindings.get("Users.Primary.Missing").is_none());
    }

    #[test]
    fn test_paths_use_binding_key() {
        let mut definition = port(Some("http://a.local/soap"), &[]);
        definition.binding.operations.insert(
            "Lookup".to_string(),
            OperationDescriptor::rpc("LookupUser", vec![], "LookupUserResponse"),
        );
        let schema = Arc::new(SchemaDefinition::new("http://x/y").with_port("Users", "Primary", definition));
        let bindings = binder().bind(schema, None).unwrap();

        assert_eq!(bindings.qualified_names(), vec!["Users.Primary.Lookup"]);
        for path in bindings.qualified_names() {
            let op = bindings.get(&path).unwrap();
            assert_eq!(op.name(), "Lookup");
            assert_eq!(op.descriptor().name, "LookupUser");
        }
    }

    #[test]
    fn test_endpoint_override_applies_to_all_ports() {
        let bindings = binder()
            .bind(two_port_schema(), Some("http://override.local/soap"))
            .unwrap();
        assert!(
            bindings
                .iter()
                .all(|op| op.address() == "http://override.local/soap")
        );
    }

    #[test]
    fn test_missing_address_fails_whole_bind() {
        let schema = Arc::new(
            SchemaDefinition::new("http://x/y")
                .with_port("A", "Good", port(Some("http://a.local"), &["Op"]))
                .with_port("B", "NoAddress", port(None, &["Op"])),
        );
        let err = binder().bind(schema, None).unwrap_err();
        assert_eq!(err.category(), "binding");
        assert!(err.to_string().contains("B.NoAddress"));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = binder()
            .bind(two_port_schema(), Some("not a url"))
            .unwrap_err();
        assert_eq!(err.category(), "binding");
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = binder()
            .bind(Arc::new(SchemaDefinition::new("http://x/y")), None)
            .unwrap_err();
        assert_eq!(err.category(), "binding");
    }
}
