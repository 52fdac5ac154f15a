//! Transport layer implementations
//!
//! This module defines the exchange contract the dispatcher relies on and
//! the reqwest-backed HTTP transport used by default.

pub mod traits;

#[cfg(feature = "http")]
pub mod http;

// Re-export commonly used types
pub use traits::{
    ClientIdentity, Transport, TransportOptions, TransportResponse, extend_headers, insert_header,
};

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportConfig, USER_AGENT};
