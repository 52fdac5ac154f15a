//! Security strategies
//!
//! A strategy augments each call: it may add transport headers, adjust the
//! transport options (client certificate, connection pool) and contribute an
//! XML fragment to the envelope header. Every strategy implements the same
//! fixed contract; the header and option hooks default to no-ops.

pub mod basic_auth;
pub mod client_ssl;
pub mod ws_security;

use std::collections::HashMap;
use std::fmt;

use crate::transport::traits::TransportOptions;

pub use basic_auth::{BasicAuthSecurity, BearerSecurity};
pub use client_ssl::ClientSslSecurity;
pub use ws_security::{PasswordType, WsSecurity, WsSecurityOptions};

/// Per-call security augmentation
pub trait SecurityStrategy: Send + Sync + fmt::Debug {
    /// Add or overwrite transport headers
    fn add_headers(&self, _headers: &mut HashMap<String, String>) {}

    /// Set transport-level parameters
    fn add_options(&self, _options: &mut TransportOptions) {}

    /// Fragment placed verbatim in the envelope header, or an empty string
    ///
    /// Must be idempotent and free of side effects.
    fn to_xml(&self) -> String;

    /// Strategy name used in logs
    fn name(&self) -> &'static str;
}

/// Strategy that contributes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecurity;

impl SecurityStrategy for NoSecurity {
    fn to_xml(&self) -> String {
        String::new()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_security_is_inert() {
        let strategy = NoSecurity;
        let mut headers = HashMap::new();
        let mut options = TransportOptions::default();

        strategy.add_headers(&mut headers);
        strategy.add_options(&mut options);

        assert!(headers.is_empty());
        assert!(options.identity.is_none());
        assert_eq!(strategy.to_xml(), "");
        assert_eq!(strategy.name(), "none");
    }
}
