// ! Schema acquisition
// !
// ! The client never parses WSDL itself; a loader hands it a ready
// ! `SchemaDefinition`. The bundled loader reads the JSON form of the model.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::core::error::{SoapError, SoapResult};
use crate::protocol::schema::SchemaDefinition;

/// Produces a schema for a source identifier
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    /// Load the schema named by `source`
    async fn load(&self, source: &str) -> SoapResult<SchemaDefinition>;
}

/// Loads a JSON-serialized [`SchemaDefinition`] from disk
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaLoader {
    base_dir: Option<PathBuf>,
}

impl JsonSchemaLoader {
    /// Create a loader resolving sources as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative sources against `dir`
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, source: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(source),
            None => PathBuf::from(source),
        }
    }
}

#[async_trait]
impl SchemaLoader for JsonSchemaLoader {
    async fn load(&self, source: &str) -> SoapResult<SchemaDefinition> {
        let path = self.resolve(source);
        debug!(path = %path.display(), "Loading schema");

        let raw = tokio::fs::read_to_string(&path).await?;
        serde_json::from_str(&raw).map_err(|e| {
            SoapError::binding(format!(
                "Schema '{}' is not a valid description: {e}",
                path.display()
            ))
        })
    }
}
