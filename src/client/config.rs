// ! Client configuration
// !
// ! `ClientConfig` is the runtime configuration shared by the facade and every
// ! bound operation. `ClientSettings` is the declarative subset that can be
// ! read from JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::SoapResult;
use crate::security::SecurityStrategy;
use crate::transport::traits::extend_headers;

/// Computes the SOAPAction from (target namespace, operation name)
pub type SoapActionResolver = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// Runtime client configuration
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Address used for every port instead of the declared one
    pub endpoint: Option<String>,
    /// Per-call security augmentation
    pub security: Option<Arc<dyn SecurityStrategy>>,
    /// Transport headers sent with every call
    pub http_headers: HashMap<String, String>,
    /// Envelope header fragments, in insertion order
    pub soap_headers: Vec<String>,
    /// SOAPAction override
    pub soap_action_resolver: Option<SoapActionResolver>,
    /// Default exchange timeout; `None` means no timeout
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("security", &self.security.as_ref().map(|s| s.name()))
            .field("http_headers", &self.http_headers.keys().collect::<Vec<_>>())
            .field("soap_headers", &self.soap_headers.len())
            .field("soap_action_resolver", &self.soap_action_resolver.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Declarative client settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Transport headers
    pub headers: HashMap<String, String>,
    /// Exchange timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ClientSettings {
    /// Parse settings from a JSON document
    pub fn from_json(json: &str) -> SoapResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply these settings on top of `config`
    pub fn apply(self, config: &mut ClientConfig) {
        if self.endpoint.is_some() {
            config.endpoint = self.endpoint;
        }
        extend_headers(&mut config.http_headers, self.headers);
        if let Some(ms) = self.timeout_ms {
            config.timeout = Some(Duration::from_millis(ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::BearerSecurity;

    #[test]
    fn test_settings_from_json() {
        let settings = ClientSettings::from_json(
            r#"{"endpoint": "http://svc.local/soap", "headers": {"X-Tenant": "acme"}, "timeout_ms": 2500}"#,
        )
        .unwrap();

        let mut config = ClientConfig::default();
        config
            .http_headers
            .insert("X-Trace".to_string(), "1".to_string());
        settings.apply(&mut config);

        assert_eq!(config.endpoint.as_deref(), Some("http://svc.local/soap"));
        assert_eq!(config.http_headers.len(), 2);
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_empty_settings_keep_config() {
        let settings = ClientSettings::from_json("{}").unwrap();
        let mut config = ClientConfig {
            endpoint: Some("http://a".to_string()),
            ..Default::default()
        };
        settings.apply(&mut config);
        assert_eq!(config.endpoint.as_deref(), Some("http://a"));
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_invalid_settings_json() {
        let err = ClientSettings::from_json("{\"timeout_ms\": \"soon\"}").unwrap_err();
        assert_eq!(err.category(), "serialization");
    }

    #[test]
    fn test_debug_names_security_only() {
        let config = ClientConfig {
            security: Some(Arc::new(BearerSecurity::new("secret-token"))),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("bearer"));
        assert!(!debug.contains("secret-token"));
    }
}
