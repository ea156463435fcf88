use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposerError {
    /// A referenced node or edge has no live counterpart.
    #[error("missing target: {0}")]
    MissingTarget(String),
    #[error("invalid port `{0}` (expected top, right, bottom or left)")]
    InvalidPort(String),
    #[error("smart connect pipeline failed during {stage}: {message}")]
    Pipeline { stage: &'static str, message: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid affinity data: {0}")]
    AffinityData(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ComposerError {
    pub fn pipeline(stage: &'static str, message: impl Into<String>) -> Self {
        ComposerError::Pipeline {
            stage,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ComposerError>;
