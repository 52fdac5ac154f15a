//! SOAP protocol implementation
//!
//! This module contains the service description model, envelope assembly
//! and the XML marshaller that converts argument trees to message fragments
//! and response envelopes back to trees.

pub mod envelope;
pub mod schema;
pub mod xml;

// Re-export commonly used types and constants
pub use envelope::{SOAP_ENCODING_NS, SOAP_ENVELOPE_NS, assemble, encoding_style_decl};
pub use schema::{
    BindingDefinition, BindingStyle, BodyUse, InputShape, MessagePart, OperationDescriptor,
    OperationSummary, OutputShape, PortDefinition, SchemaDefinition, ServiceDefinition,
    ServicesDescription, TNS_PREFIX,
};
pub use xml::{ATTRIBUTES_KEY, Marshaller, SoapFault, TEXT_KEY, XmlMarshaller};
