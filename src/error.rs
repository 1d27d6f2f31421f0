use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // Stage received a data variant it cannot consume
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    // Dimension or element count errors
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Size mismatch: expected {expected} elements, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    // Pipeline and engine configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network kind is undefined, cannot build an input tensor from raw image data")]
    UndefinedNetworkKind,

    // Model stream decoding
    #[error("Unknown stage type tag: {0}")]
    UnknownStageType(i32),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EngineError {
    // Errors the caller is not expected to recover from. The CLI terminates on these.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::UnknownStageType(_) | EngineError::UndefinedNetworkKind)
    }
}
