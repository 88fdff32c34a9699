//! Streaming generation via an external llama.cpp-style executable.
//!
//! One subprocess per request: `GenerationEngine` launches the executable in
//! single-shot batch mode over an already rendered prompt, decodes stdout
//! incrementally, triages stderr, and hands fragments to the caller in
//! emission order. `postprocess::finalize` cleans the accumulated text once
//! the stream ends.

mod config;
mod decode;
mod engine;
pub mod postprocess;
mod stderr;

pub use config::GenerationConfig;
pub use engine::{EngineState, GenerationEngine};
pub use postprocess::ProcessedResponse;
