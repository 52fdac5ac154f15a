// ! Client builder for SOAP clients
// !
// ! Provides a builder pattern for creating and configuring SOAP clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::client::config::{ClientConfig, ClientSettings};
use crate::client::soap_client::SoapClient;
use crate::core::error::SoapResult;
use crate::protocol::schema::SchemaDefinition;
use crate::protocol::xml::{Marshaller, XmlMarshaller};
use crate::security::SecurityStrategy;
use crate::transport::traits::{Transport, extend_headers, insert_header};

/// Builder for creating SOAP clients with configuration
#[derive(Default)]
pub struct SoapClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    marshaller: Option<Arc<dyn Marshaller>>,
    endpoint: Option<String>,
    security: Option<Arc<dyn SecurityStrategy>>,
    http_headers: HashMap<String, String>,
    soap_headers: Vec<String>,
    timeout: Option<Duration>,
    settings: Option<ClientSettings>,
}

impl SoapClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transport
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the default marshaller
    pub fn with_marshaller(mut self, marshaller: Arc<dyn Marshaller>) -> Self {
        self.marshaller = Some(marshaller);
        self
    }

    /// Set the endpoint override
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the security strategy
    pub fn with_security(mut self, security: Arc<dyn SecurityStrategy>) -> Self {
        self.security = Some(security);
        self
    }

    /// Add a transport header
    pub fn with_http_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        insert_header(&mut self.http_headers, name, value);
        self
    }

    /// Append a raw envelope header fragment
    pub fn with_soap_header<S: Into<String>>(mut self, fragment: S) -> Self {
        self.soap_headers.push(fragment.into());
        self
    }

    /// Set the default exchange timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply declarative settings; explicit builder values take precedence
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Build an unbound client
    ///
    /// Without an explicit transport the HTTP transport is used when the
    /// `http` feature is enabled.
    pub fn build(self) -> SoapResult<SoapClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        let marshaller = self
            .marshaller
            .unwrap_or_else(|| Arc::new(XmlMarshaller::new()));

        let mut config = ClientConfig::default();
        if let Some(settings) = self.settings {
            settings.apply(&mut config);
        }
        if self.endpoint.is_some() {
            config.endpoint = self.endpoint;
        }
        extend_headers(&mut config.http_headers, self.http_headers);
        if self.timeout.is_some() {
            config.timeout = self.timeout;
        }
        config.security = self.security;
        config.soap_headers = self.soap_headers;

        Ok(SoapClient::with_parts(transport, marshaller, config))
    }

    /// Build a client and bind `schema`
    pub async fn build_with_schema(self, schema: SchemaDefinition) -> SoapResult<SoapClient> {
        let client = self.build()?;
        client.bind_schema(schema).await?;
        Ok(client)
    }
}

#[cfg(feature = "http")]
fn default_transport() -> SoapResult<Arc<dyn Transport>> {
    Ok(Arc::new(crate::transport::http::HttpTransport::new()?))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> SoapResult<Arc<dyn Transport>> {
    Err(crate::core::error::SoapError::configuration(
        "No transport configured and the http feature is disabled",
    ))
}

impl std::fmt::Debug for SoapClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("security", &self.security.as_ref().map(|s| s.name()))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SoapError;
    use crate::security::NoSecurity;
    use crate::transport::traits::{TransportOptions, TransportResponse};
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
            Err(SoapError::transport("unused"))
        }
    }

    #[tokio::test]
    async fn test_builder_precedence() {
        let settings = ClientSettings {
            endpoint: Some("http://from-settings".to_string()),
            timeout_ms: Some(1000),
            ..Default::default()
        };
        let client = SoapClientBuilder::new()
            .with_transport(Arc::new(NullTransport))
            .with_settings(settings)
            .with_endpoint("http://explicit")
            .with_security(Arc::new(NoSecurity))
            .with_soap_header("<A/>")
            .with_soap_header("<B/>")
            .build()
            .unwrap();

        assert_eq!(client.endpoint().await.as_deref(), Some("http://explicit"));
        assert_eq!(client.soap_headers().await, vec!["<A/>", "<B/>"]);
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_default_transport_is_http() {
        assert!(SoapClientBuilder::new().build().is_ok());
    }
}
