// ! HTTP authorization header strategies

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::collections::HashMap;
use std::fmt;

use crate::security::SecurityStrategy;

/// HTTP Basic authentication
#[derive(Clone)]
pub struct BasicAuthSecurity {
    username: String,
    authorization: String,
}

impl BasicAuthSecurity {
    /// Create a Basic strategy for the given credentials
    pub fn new(username: impl Into<String>, password: impl AsRef<str>) -> Self {
        let username = username.into();
        let token = STANDARD.encode(format!("{}:{}", username, password.as_ref()));
        Self {
            username,
            authorization: format!("Basic {token}"),
        }
    }
}

impl fmt::Debug for BasicAuthSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthSecurity")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SecurityStrategy for BasicAuthSecurity {
    fn add_headers(&self, headers: &mut HashMap<String, String>) {
        headers.insert("Authorization".to_string(), self.authorization.clone());
    }

    fn to_xml(&self) -> String {
        String::new()
    }

    fn name(&self) -> &'static str {
        "basic"
    }
}

/// Bearer token authentication
#[derive(Clone)]
pub struct BearerSecurity {
    token: String,
}

impl BearerSecurity {
    /// Create a Bearer strategy
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerSecurity").finish_non_exhaustive()
    }
}

impl SecurityStrategy for BearerSecurity {
    fn add_headers(&self, headers: &mut HashMap<String, String>) {
        headers.insert("Authorization".to_string(), format!("Bearer {}", self.token));
    }

    fn to_xml(&self) -> String {
        String::new()
    }

    fn name(&self) -> &'static str {
        "bearer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let strategy = BasicAuthSecurity::new("alice", "wonderland");
        let mut headers = HashMap::new();
        strategy.add_headers(&mut headers);
        assert_eq!(
            headers.get("Authorization").map(String::as_str),
            Some("Basic YWxpY2U6d29uZGVybGFuZA==")
        );
        assert_eq!(strategy.to_xml(), "");
    }

    #[test]
    fn test_basic_overwrites_existing_header() {
        let strategy = BasicAuthSecurity::new("alice", "wonderland");
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "stale".to_string());
        strategy.add_headers(&mut headers);
        assert_ne!(headers["Authorization"], "stale");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let basic = format!("{:?}", BasicAuthSecurity::new("alice", "wonderland"));
        assert!(basic.contains("alice"));
        assert!(!basic.contains("YWxpY2U6"));

        let bearer = format!("{:?}", BearerSecurity::new("tok-123"));
        assert!(!bearer.contains("tok-123"));
    }

    #[test]
    fn test_bearer_header() {
        let strategy = BearerSecurity::new("tok-123");
        let mut headers = HashMap::new();
        strategy.add_headers(&mut headers);
        assert_eq!(headers["Authorization"], "Bearer tok-123");
        assert_eq!(strategy.name(), "bearer");
    }
}
