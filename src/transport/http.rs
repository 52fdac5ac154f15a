// ! HTTP transport implementation for SOAP
// !
// ! Module provides the reqwest-backed exchange used by default: one POST per
// ! call, a fixed header set, optional client identity and pooled clients.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Identity};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::error::{SoapError, SoapResult};
use crate::transport::traits::{ClientIdentity, Transport, TransportOptions, TransportResponse};

/// User-Agent sent with every request, fixed at build time
pub const USER_AGENT: &str = concat!("prism-soap-rs/", env!("CARGO_PKG_VERSION"));

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("User-Agent", USER_AGENT),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml,text/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Encoding", "none"),
    ("Accept-Charset", "utf-8"),
    ("Connection", "close"),
];

/// Configuration for [`HttpTransport`]
#[derive(Debug, Clone, Default)]
pub struct HttpTransportConfig {
    /// Connection establishment timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// HTTP transport for SOAP clients
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    /// Clients built for a named pool, reused across calls
    pools: Mutex<HashMap<String, Client>>,
}

impl HttpTransport {
    /// Create a new HTTP transport with default configuration
    pub fn new() -> SoapResult<Self> {
        Self::with_config(HttpTransportConfig::default())
    }

    /// Create a new HTTP transport with custom configuration
    pub fn with_config(config: HttpTransportConfig) -> SoapResult<Self> {
        let client = Self::client_builder(&config)
            .build()
            .map_err(|e| SoapError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            pools: Mutex::new(HashMap::new()),
        })
    }

    fn client_builder(config: &HttpTransportConfig) -> reqwest::ClientBuilder {
        let mut builder = Client::builder();
        if let Some(ms) = config.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        builder
    }

    fn build_identity_client(&self, identity: &ClientIdentity) -> SoapResult<Client> {
        let identity = Identity::from_pem(&identity.to_pem_bundle())
            .map_err(|e| SoapError::configuration(format!("Invalid client identity: {e}")))?;
        Self::client_builder(&self.config)
            .identity(identity)
            .build()
            .map_err(|e| SoapError::Http(format!("Failed to create HTTP client: {e}")))
    }

    /// Pick the client for a call
    ///
    /// Calls without an identity share the default client. A call with an
    /// identity reuses the client cached under its pool key, or gets a
    /// dedicated client when no pool key is set.
    async fn client_for(&self, options: &TransportOptions) -> SoapResult<Client> {
        let Some(identity) = &options.identity else {
            return Ok(self.client.clone());
        };
        let Some(pool_key) = &options.pool_key else {
            return self.build_identity_client(identity);
        };

        let mut pools = self.pools.lock().await;
        if let Some(client) = pools.get(pool_key) {
            return Ok(client.clone());
        }
        let client = self.build_identity_client(identity)?;
        pools.insert(pool_key.clone(), client.clone());
        Ok(client)
    }

    /// Number of cached pool clients
    pub async fn pool_count(&self) -> usize {
        self.pools.lock().await.len()
    }
}

/// Default headers with the option headers layered on top
pub(crate) fn request_headers(options: &TransportOptions) -> SoapResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut option_headers: Vec<_> = options
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    option_headers.sort_unstable();
    let pairs = DEFAULT_HEADERS
        .iter()
        .map(|(name, value)| (*name, *value))
        .chain(option_headers);
    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SoapError::transport(format!("Invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| SoapError::transport(format!("Invalid value for header '{name}': {e}")))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(
        &self,
        address: &str,
        body: String,
        options: &TransportOptions,
    ) -> SoapResult<TransportResponse> {
        let client = self.client_for(options).await?;
        let headers = request_headers(options)?;

        debug!(
            address = address,
            body_len = body.len(),
            pooled = options.pool_key.is_some(),
            "POST SOAP envelope"
        );

        let mut request = client.post(address).headers(headers).body(body);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(SoapError::from)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(SoapError::from)?;

        debug!(address = address, status = status, "SOAP response received");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }

    fn transport_info(&self) -> String {
        format!(
            "HTTP transport (connect timeout: {:?} ms)",
            self.config.connect_timeout_ms
        )
    }
}
