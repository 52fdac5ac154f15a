// ! Structured logging for the SOAP client
// !
// ! Module provides structured error logging with categorization and
// ! context preservation on top of `tracing`.

use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{Level, error, info, span, warn};

use crate::core::error::SoapError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLogLevel {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but the client can continue
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational error context
    Info,
}

impl From<&SoapError> for ErrorLogLevel {
    fn from(error: &SoapError) -> Self {
        match error {
            SoapError::Internal(_) => ErrorLogLevel::Critical,

            SoapError::Configuration(_)
            | SoapError::Binding(_)
            | SoapError::Transport(_)
            | SoapError::Decode { .. }
            | SoapError::Serialization(_) => ErrorLogLevel::Error,

            SoapError::Connection(_)
            | SoapError::Timeout(_)
            | SoapError::Io(_)
            | SoapError::Fault { .. } => ErrorLogLevel::Warning,

            #[cfg(feature = "http")]
            SoapError::Http(_) => ErrorLogLevel::Warning,

            // Caller-side problems
            SoapError::StyleMismatch { .. }
            | SoapError::Marshal(_)
            | SoapError::NotReady(_)
            | SoapError::OperationNotFound(_)
            | SoapError::Url(_) => ErrorLogLevel::Info,
        }
    }
}

/// Extended error context for logging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Operation being performed when error occurred
    pub operation: String,
    /// Transport type (http, custom)
    pub transport: Option<String>,
    /// SOAP operation name if applicable
    pub method: Option<String>,
    /// Endpoint address the call was sent to
    pub address: Option<String>,
    /// Additional context data
    pub extra: HashMap<String, Value>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            operation: "unknown".to_string(),
            transport: None,
            method: None,
            address: None,
            extra: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    /// Set transport type
    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// Set SOAP operation name
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set endpoint address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Add extra context data
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Structured error logger
pub struct ErrorLogger;

impl ErrorLogger {
    /// Log an error with full context
    pub fn log_error(error: &SoapError, context: &ErrorContext) {
        let category = error.category();
        let recoverable = error.is_recoverable();

        let log_data = json!({
            "error_category": category,
            "error_recoverable": recoverable,
            "error_message": error.to_string(),
            "operation": context.operation,
            "transport": context.transport,
            "method": context.method,
            "address": context.address,
            "extra_context": context.extra,
        });
        let payload = serde_json::to_string(&log_data).unwrap_or_default();

        match ErrorLogLevel::from(error) {
            ErrorLogLevel::Critical => {
                error!(
                    target: "soap_errors",
                    error_category = category,
                    error_recoverable = recoverable,
                    operation = context.operation.as_str(),
                    "CRITICAL SOAP Error: {} - {}",
                    error,
                    payload
                );
            }
            ErrorLogLevel::Error => {
                error!(
                    target: "soap_errors",
                    error_category = category,
                    error_recoverable = recoverable,
                    operation = context.operation.as_str(),
                    "SOAP Error: {} - {}",
                    error,
                    payload
                );
            }
            ErrorLogLevel::Warning => {
                warn!(
                    target: "soap_errors",
                    error_category = category,
                    error_recoverable = recoverable,
                    operation = context.operation.as_str(),
                    "SOAP Warning: {} - {}",
                    error,
                    payload
                );
            }
            ErrorLogLevel::Info => {
                info!(
                    target: "soap_errors",
                    error_category = category,
                    error_recoverable = recoverable,
                    operation = context.operation.as_str(),
                    "SOAP Info: {} - {}",
                    error,
                    payload
                );
            }
        }
    }

    /// Create a logging span for an operation
    pub fn create_operation_span(operation: &str, context: &ErrorContext) -> tracing::Span {
        span!(
            Level::INFO,
            "soap_operation",
            operation = operation,
            transport = context.transport.as_deref(),
            method = context.method.as_deref(),
            address = context.address.as_deref(),
        )
    }
}

impl SoapError {
    /// Log this error with structured context
    pub fn log_with_context(&self, context: &ErrorContext) {
        ErrorLogger::log_error(self, context);
    }
}
