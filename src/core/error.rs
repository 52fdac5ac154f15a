// ! Error types for the SOAP client
// !
// ! Module defines every failure the client can report, from configuration
// ! problems caught at construction to per-call transport and decode failures.

use thiserror::Error;

use crate::protocol::schema::BindingStyle;
use crate::protocol::xml::SoapFault;
use crate::transport::traits::TransportResponse;

/// The main error type for the SOAP client
#[derive(Error, Debug, Clone)]
pub enum SoapError {
    /// Security material or client configuration could not be loaded
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The schema does not have the shape the binder expects
    #[error("Binding error: {0}")]
    Binding(String),

    /// Declared binding style conflicts with the operation's input shape
    #[error("Style mismatch for operation '{operation}': {input} input cannot use {style} binding")]
    StyleMismatch {
        /// Operation name
        operation: String,
        /// Declared binding style
        style: BindingStyle,
        /// Kind of input message found on the descriptor
        input: &'static str,
    },

    /// The exchange with the remote endpoint failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP-level errors when using the HTTP transport
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(String),

    /// Connection-related errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The response body could not be parsed as a SOAP envelope
    #[error("Decode error: {message}")]
    Decode {
        /// Parser message
        message: String,
        /// The transport response, including the raw body
        response: Box<TransportResponse>,
    },

    /// The server answered with a SOAP Fault
    #[error("SOAP fault: {fault}")]
    Fault {
        /// Parsed fault
        fault: Box<SoapFault>,
        /// Raw response body
        body: String,
    },

    /// Arguments could not be rendered as XML
    #[error("Marshal error: {0}")]
    Marshal(String),

    /// The client has no bound schema
    #[error("Client not ready: {0}")]
    NotReady(String),

    /// No operation is bound under the requested name or path
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors from the standard library
    #[error("I/O error: {0}")]
    Io(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(String),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual From implementations for types that don't implement Clone
impl From<serde_json::Error> for SoapError {
    fn from(err: serde_json::Error) -> Self {
        SoapError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SoapError {
    fn from(err: std::io::Error) -> Self {
        SoapError::Io(err.to_string())
    }
}

impl From<url::ParseError> for SoapError {
    fn from(err: url::ParseError) -> Self {
        SoapError::Url(err.to_string())
    }
}

impl From<quick_xml::Error> for SoapError {
    fn from(err: quick_xml::Error) -> Self {
        SoapError::Marshal(err.to_string())
    }
}

/// Result type alias for SOAP operations
pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new binding error
    pub fn binding<S: Into<String>>(message: S) -> Self {
        Self::Binding(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new marshal error
    pub fn marshal<S: Into<String>>(message: S) -> Self {
        Self::Marshal(message.into())
    }

    /// Create a new not-ready error
    pub fn not_ready<S: Into<String>>(message: S) -> Self {
        Self::NotReady(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Create a decode error that keeps the response for diagnosis
    pub fn decode<S: Into<String>>(message: S, response: TransportResponse) -> Self {
        Self::Decode {
            message: message.into(),
            response: Box::new(response),
        }
    }

    /// Raw response body attached to this error, if any
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            SoapError::Decode { response, .. } => Some(response.body.as_str()),
            SoapError::Fault { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Nothing in this crate retries; the flag only tells callers whether
    /// invoking the operation again could succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SoapError::Connection(_) | SoapError::Timeout(_) | SoapError::Io(_) => true,
            #[cfg(feature = "http")]
            SoapError::Http(_) => true,
            SoapError::Transport(_) => false,
            SoapError::Configuration(_)
            | SoapError::Binding(_)
            | SoapError::StyleMismatch { .. }
            | SoapError::Decode { .. }
            | SoapError::Fault { .. }
            | SoapError::Marshal(_)
            | SoapError::NotReady(_)
            | SoapError::OperationNotFound(_)
            | SoapError::Serialization(_)
            | SoapError::Url(_)
            | SoapError::Internal(_) => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SoapError::Configuration(_) => "configuration",
            SoapError::Binding(_) => "binding",
            SoapError::StyleMismatch { .. } => "style_mismatch",
            SoapError::Transport(_) => "transport",
            #[cfg(feature = "http")]
            SoapError::Http(_) => "http",
            SoapError::Connection(_) => "connection",
            SoapError::Timeout(_) => "timeout",
            SoapError::Decode { .. } => "decode",
            SoapError::Fault { .. } => "fault",
            SoapError::Marshal(_) => "marshal",
            SoapError::NotReady(_) => "lifecycle",
            SoapError::OperationNotFound(_) => "not_found",
            SoapError::Serialization(_) => "serialization",
            SoapError::Io(_) => "io",
            SoapError::Url(_) => "validation",
            SoapError::Internal(_) => "internal",
        }
    }
}

// Convert common HTTP errors when the feature is enabled
#[cfg(feature = "http")]
impl From<reqwest::Error> for SoapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SoapError::Timeout(err.to_string())
        } else if err.is_connect() {
            SoapError::Connection(err.to_string())
        } else {
            SoapError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_error_creation() {
        let error = SoapError::transport("connection refused");
        assert_eq!(error.to_string(), "Transport error: connection refused");
        assert_eq!(error.category(), "transport");
    }

    #[test]
    fn test_style_mismatch_message() {
        let error = SoapError::StyleMismatch {
            operation: "GetQuote".to_string(),
            style: BindingStyle::Document,
            input: "parts",
        };
        assert_eq!(
            error.to_string(),
            "Style mismatch for operation 'GetQuote': parts input cannot use document binding"
        );
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_decode_error_keeps_body() {
        let response = TransportResponse {
            status: 502,
            headers: HashMap::new(),
            body: "<html>Bad Gateway</html>".to_string(),
        };
        let error = SoapError::decode("root element is not a SOAP envelope", response);
        assert_eq!(error.category(), "decode");
        assert_eq!(error.raw_body(), Some("<html>Bad Gateway</html>"));
    }

    #[test]
    fn test_error_recovery() {
        assert!(SoapError::connection("reset").is_recoverable());
        assert!(SoapError::timeout("slow").is_recoverable());
        assert!(!SoapError::binding("no ports").is_recoverable());
        assert!(!SoapError::configuration("missing key").is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "key.pem");
        let error: SoapError = io.into();
        assert_eq!(error.category(), "io");
    }
}
