//! Utility functions and helpers for the SOAP client

pub mod digest;

pub use digest::password_digest;
