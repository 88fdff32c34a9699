//! Persistence boundary for document chunks.
//!
//! The core treats stored chunks as the source of truth and never talks to a
//! database directly; a host application implements `ChunkStore` over
//! whatever backend it uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

/// A bounded, overlapping segment of a source document; the unit of
/// retrieval. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk identifier.
    pub id: String,
    /// Identifier of the owning document.
    pub document_id: String,
    /// Display name of the owning document, used as the source label.
    pub document_name: String,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    /// The chunk text.
    pub content: String,
}

impl DocumentChunk {
    pub fn new(
        document_id: impl Into<String>,
        document_name: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            document_name: document_name.into(),
            chunk_index,
            content: content.into(),
        }
    }
}

/// Abstract storage for document chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persist a batch of freshly chunked content.
    async fn insert_batch(&self, chunks: Vec<DocumentChunk>) -> Result<(), CoreError>;

    /// Load every stored chunk, e.g. to rebuild the retrieval index on start.
    async fn load_all(&self) -> Result<Vec<DocumentChunk>, CoreError>;

    /// Delete all chunks belonging to a document. Returns the removed count.
    async fn delete_document(&self, document_id: &str) -> Result<usize, CoreError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, CoreError>;
}
