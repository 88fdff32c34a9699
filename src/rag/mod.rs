//! Offline retrieval over user documents.
//!
//! This module provides:
//! - `Chunker`: splits extracted document text into overlapping,
//!   sentence-bounded segments
//! - `RetrievalIndex`: lexical TF-IDF search over those segments
//! - `ChunkStore`: the boundary trait an external persistence layer implements

mod chunker;
mod index;
mod store;

pub use chunker::{Chunker, ChunkerConfig};
pub use index::{RetrievalIndex, RetrievalResult};
pub use store::{ChunkStore, DocumentChunk};
