use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid validation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("No active workflow")]
    NoActiveWorkflow,

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Invalid step transition from {from} to {to}")]
    InvalidStepTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Error {
    /// True for failures that came from the backend collaborator, including
    /// calls that never answered in time.
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
