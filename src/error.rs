//! Error types for gesture recognition operations

/// Result type for gesture recognition operations
pub type Result<T> = std::result::Result<T, GestureError>;

/// Error types for gesture recognition operations
#[derive(thiserror::Error, Debug)]
pub enum GestureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed landmarks in {group}: {reason}")]
    MalformedLandmarks { group: &'static str, reason: String },

    #[error("Keypoint vector must have {expected} elements, got {actual}")]
    KeypointLength { expected: usize, actual: usize },

    #[error("Empty sequence cannot be classified")]
    EmptySequence,

    #[error("Malformed inference input: {0}")]
    MalformedInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Dataset not found: {0}")]
    DatasetMissing(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Frame source error: {0}")]
    FrameSource(String),
}
