// Copyright (c) 2025 Prism SOAP Contributors
// SPDX-License-Identifier: MIT

//! # Prism SOAP client
//!
//! An async SOAP 1.1 client. Give it a service description (services, ports,
//! operations and their message shapes) and it exposes every operation as a
//! callable, assembles the envelope for each call, applies the configured
//! security strategy, performs the exchange and extracts the result payload.
// !
//! ## Features
//!
//! - **Dynamic binding**: one callable per operation, reachable by bare name
//!   or by `service.port.operation`
//! - **RPC and document style**: style/shape conflicts are rejected before
//!   anything is sent
//! - **Pluggable security**: client certificates, HTTP Basic/Bearer and
//!   WS-Security UsernameToken (text or digest)
//! - **Swappable transport**: reqwest-backed HTTP by default, any
//!   [`transport::Transport`] implementation otherwise
// !
//! ## Quick Start
//!
//! ```rust,no_run
//! use prism_soap_rs::prelude::*;
//!
//! # async fn run(schema: SchemaDefinition) -> SoapResult<()> {
//! let client = SoapClientBuilder::new()
//!     .with_security(Arc::new(BasicAuthSecurity::new("alice", "wonderland")))
//!     .build_with_schema(schema)
//!     .await?;
//!
//! let result = client.call("GetUser", json!({"id": 7}), None).await?;
//! println!("{:?}", result.payload);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: Errors and structured error logging
//! - [`protocol`]: Service description model, envelope assembly, XML marshalling
//! - [`security`]: Security strategies
//! - [`transport`]: Transport contract and the HTTP transport
//! - [`client`]: Client facade, service binder and operation dispatcher
//! - [`utils`]: Utility functions and helpers

pub mod client;
pub mod core;
pub mod protocol;
pub mod security;
pub mod transport;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::error::{SoapError, SoapResult};

/// Prelude module for convenient imports
///
/// Use `use prism_soap_rs::prelude::*;` to import everything you need.
pub mod prelude {
    // Core types
    pub use crate::core::error::{SoapError, SoapResult};

    // Protocol types
    pub use crate::protocol::{
        BindingDefinition, BindingStyle, BodyUse, InputShape, Marshaller, MessagePart,
        OperationDescriptor, OutputShape, PortDefinition, SchemaDefinition, ServiceDefinition,
        XmlMarshaller,
    };

    // Client
    pub use crate::client::{
        BoundOperation, CallArgs, CallResult, ClientSettings, ClientState, JsonSchemaLoader,
        SchemaLoader, SoapClient, SoapClientBuilder, SoapHeader,
    };

    // Security strategies
    pub use crate::security::{
        BasicAuthSecurity, BearerSecurity, ClientSslSecurity, NoSecurity, PasswordType,
        SecurityStrategy, WsSecurity, WsSecurityOptions,
    };

    // Transport layer
    pub use crate::transport::{Transport, TransportOptions, TransportResponse};

    #[cfg(feature = "http")]
    pub use crate::transport::HttpTransport;

    // Essential external types
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::collections::HashMap;
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Basic smoke test to ensure all modules are accessible
        let error = SoapError::binding("test");
        assert_eq!(error.category(), "binding");
    }
}
