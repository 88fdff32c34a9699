//! Core of a local, document-grounded chat application.
//!
//! Inference is delegated to an external llama.cpp-style executable, one
//! subprocess per generation. The library covers everything around that call:
//! chunking and TF-IDF retrieval over user documents, per-model-family prompt
//! rendering, streaming output decode, and response cleanup.

pub mod chat;
pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod rag;
