// ! Client certificate security
// !
// ! Key and certificate are read once at construction; every call then gets
// ! the same identity and pool key, so the transport can reuse one TLS client.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::core::error::{SoapError, SoapResult};
use crate::security::SecurityStrategy;
use crate::transport::traits::{ClientIdentity, TransportOptions};

/// Presents a client certificate on every call
#[derive(Debug, Clone)]
pub struct ClientSslSecurity {
    identity: ClientIdentity,
    pool_key: String,
}

impl ClientSslSecurity {
    /// Load the private key and certificate from PEM files
    ///
    /// Fails with a configuration error when either file cannot be read.
    pub fn new(key_path: impl AsRef<Path>, cert_path: impl AsRef<Path>) -> SoapResult<Self> {
        let key_path = key_path.as_ref();
        let cert_path = cert_path.as_ref();
        let key = std::fs::read(key_path).map_err(|e| {
            SoapError::configuration(format!(
                "Unable to read private key '{}': {e}",
                key_path.display()
            ))
        })?;
        let cert = std::fs::read(cert_path).map_err(|e| {
            SoapError::configuration(format!(
                "Unable to read certificate '{}': {e}",
                cert_path.display()
            ))
        })?;
        Self::from_pem(key, cert)
    }

    /// Build from in-memory PEM material
    pub fn from_pem(key: impl Into<Vec<u8>>, cert: impl Into<Vec<u8>>) -> SoapResult<Self> {
        let key = key.into();
        let cert = cert.into();
        if key.is_empty() {
            return Err(SoapError::configuration("Private key is empty"));
        }
        if cert.is_empty() {
            return Err(SoapError::configuration("Certificate is empty"));
        }

        let digest = Sha256::digest(&cert);
        let fingerprint: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();

        Ok(Self {
            identity: ClientIdentity::new(cert, key),
            pool_key: format!("client-ssl:{fingerprint}"),
        })
    }

    /// Pool key shared by every call made with this identity
    pub fn pool_key(&self) -> &str {
        &self.pool_key
    }
}

impl SecurityStrategy for ClientSslSecurity {
    fn add_options(&self, options: &mut TransportOptions) {
        options.identity = Some(self.identity.clone());
        options.pool_key = Some(self.pool_key.clone());
    }

    fn to_xml(&self) -> String {
        String::new()
    }

    fn name(&self) -> &'static str {
        "client-ssl"
    }
}
