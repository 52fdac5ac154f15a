// ! Transport layer traits and abstractions
// !
// ! Module defines the exchange contract the dispatcher relies on and the
// ! option set that security strategies and callers can contribute to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::SoapResult;

/// Client certificate and private key presented during the TLS handshake
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// PEM-encoded certificate (chain)
    pub cert_pem: Arc<[u8]>,
    /// PEM-encoded private key
    pub key_pem: Arc<[u8]>,
}

impl ClientIdentity {
    /// Create a new identity from PEM material
    pub fn new(cert_pem: impl Into<Arc<[u8]>>, key_pem: impl Into<Arc<[u8]>>) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
        }
    }

    /// Certificate followed by key, the layout TLS backends accept
    pub fn to_pem_bundle(&self) -> Vec<u8> {
        let mut bundle = Vec::with_capacity(self.cert_pem.len() + self.key_pem.len() + 1);
        bundle.extend_from_slice(&self.cert_pem);
        if !bundle.ends_with(b"\n") {
            bundle.push(b'\n');
        }
        bundle.extend_from_slice(&self.key_pem);
        bundle
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Insert a header, replacing any entry whose name differs only in case
pub fn insert_header(
    headers: &mut HashMap<String, String>,
    name: impl Into<String>,
    value: impl Into<String>,
) {
    let name = name.into();
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value.into());
}

/// Insert every header from `source` with [`insert_header`]
///
/// Names are applied in sorted order so that case variants within `source`
/// resolve the same way on every call.
pub fn extend_headers(headers: &mut HashMap<String, String>, source: HashMap<String, String>) {
    let mut source: Vec<_> = source.into_iter().collect();
    source.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in source {
        insert_header(headers, name, value);
    }
}

/// Per-call transport options
///
/// Built by the dispatcher from the client's custom headers, the caller's
/// overlay and the security strategy's contributions.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Client certificate/key pair
    pub identity: Option<ClientIdentity>,
    /// Connection pool to use; calls sharing a key share connections
    pub pool_key: Option<String>,
    /// Deadline for the whole exchange; `None` means no timeout
    pub timeout: Option<Duration>,
}

impl TransportOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing any entry whose name differs only in case
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.headers, name, value);
    }

    /// Set every header in `headers`, in name order
    pub fn extend_headers(&mut self, headers: HashMap<String, String>) {
        extend_headers(&mut self.headers, headers);
    }

    /// Set the exchange timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Layer `overlay` on top of these options; values set in `overlay` win
    pub fn merge(mut self, overlay: TransportOptions) -> Self {
        self.extend_headers(overlay.headers);
        if overlay.identity.is_some() {
            self.identity = overlay.identity;
        }
        if overlay.pool_key.is_some() {
            self.pool_key = overlay.pool_key;
        }
        if overlay.timeout.is_some() {
            self.timeout = overlay.timeout;
        }
        self
    }
}

/// Result of a single exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResponse {
    /// Status code reported by the peer
    pub status: u16,
    /// Response headers (lower-cased names)
    pub headers: HashMap<String, String>,
    /// Raw response body
    pub body: String,
}

impl TransportResponse {
    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Transport trait for SOAP clients
///
/// Performs one request/response exchange. Implementations must not retry;
/// a non-success status is still a completed exchange and is returned as a
/// response, since SOAP faults travel on HTTP 500.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` to `address` and wait for the response
    async fn exchange(
        &self,
        address: &str,
        body: String,
        options: &TransportOptions,
    ) -> SoapResult<TransportResponse>;

    /// Short transport name used in logs
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Get connection information for debugging
    fn transport_info(&self) -> String {
        "Unknown transport".to_string()
    }
}
