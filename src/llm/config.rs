use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Sampling and budget parameters for one generation request. Constructed
/// once from settings; callers may clone and override per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Context window size passed to the executable.
    pub ctx_size: u32,
    pub temperature: f64,
    pub repeat_penalty: f64,
    /// How many trailing tokens the repetition penalty considers.
    pub repeat_window: u32,
    pub top_p: f64,
    pub top_k: u32,
    /// Stop strings forwarded to the executable as reverse prompts.
    pub stop: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        // Conservative defaults that behave on small local models.
        Self {
            max_tokens: 512,
            ctx_size: 4096,
            temperature: 0.7,
            repeat_penalty: 1.1,
            repeat_window: 64,
            top_p: 0.95,
            top_k: 40,
            stop: Vec::new(),
        }
    }
}

impl GenerationConfig {
    /// All numeric fields must be positive; checked before any launch.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_tokens == 0 {
            return Err(CoreError::Config("max_tokens must be positive".into()));
        }
        if self.ctx_size == 0 {
            return Err(CoreError::Config("ctx_size must be positive".into()));
        }
        if self.temperature <= 0.0 {
            return Err(CoreError::Config("temperature must be positive".into()));
        }
        if self.repeat_penalty <= 0.0 {
            return Err(CoreError::Config("repeat_penalty must be positive".into()));
        }
        if self.repeat_window == 0 {
            return Err(CoreError::Config("repeat_window must be positive".into()));
        }
        if self.top_p <= 0.0 {
            return Err(CoreError::Config("top_p must be positive".into()));
        }
        if self.top_k == 0 {
            return Err(CoreError::Config("top_k must be positive".into()));
        }
        Ok(())
    }
}
