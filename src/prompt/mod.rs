//! Prompt serialization for the supported model families.
//!
//! `PromptFormat` is selected once when a model is loaded, by substring rules
//! over the model filename; `PromptBuilder` then renders history and
//! retrieved context into that family's literal token layout.

mod builder;
mod format;

pub use builder::PromptBuilder;
pub use format::PromptFormat;
