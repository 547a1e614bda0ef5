use locktrace_reasoning::ReasoningServiceError;
use std::path::PathBuf;
use thiserror::Error;

/// A single trace entry that could not be turned into an endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Entry {index} skipped: {reason}")]
pub struct EntryParseError {
    pub index: usize,
    pub reason: String,
}

impl EntryParseError {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LocktraceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    EntryParse(#[from] EntryParseError),

    #[error("Reasoning service error: {0}")]
    Reasoning(#[from] ReasoningServiceError),

    #[error("Failed to write {}: {error}", .path.display())]
    ArtifactWrite {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Credential store error: {0}")]
    Credentials(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LocktraceError>;
