//! SOAP client implementation
//!
//! This module provides the client facade, the service binder that turns a
//! schema into callable operations, and the dispatcher that runs each call.

pub mod binder;
pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod loader;
pub mod soap_client;

// Re-export the main client type and builder
pub use binder::{BoundOperation, ServiceBinder, ServiceBindings};
pub use builder::SoapClientBuilder;
pub use config::{ClientConfig, ClientSettings, SoapActionResolver};
pub use dispatcher::{CallArgs, CallResult, CONTENT_TYPE, Diagnostics, OperationDispatcher};
pub use loader::{JsonSchemaLoader, SchemaLoader};
pub use soap_client::{ClientState, SoapClient, SoapHeader};
