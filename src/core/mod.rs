//! Core abstractions and types for the SOAP client
//!
//! This module contains error handling and structured error logging shared by
//! every other layer.

pub mod error;
pub mod logging;

// Re-export commonly used items
pub use error::{SoapError, SoapResult};
pub use logging::{ErrorContext, ErrorLogLevel, ErrorLogger};
