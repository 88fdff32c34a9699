use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("a generation is already running")]
    Busy,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("the prompt exceeded the model's context window; shorten the conversation or attach fewer documents")]
    ContextOverflow,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn config<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Config(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Generation(err.to_string())
    }
}
