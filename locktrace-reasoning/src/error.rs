use thiserror::Error;

/// Failure of a single call to the reasoning service.
#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Reasoning service returned status {status}: {body}")]
    StatusError { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Failure of a whole invocation, after the retry policy has run its course.
#[derive(Error, Debug)]
pub enum ReasoningServiceError {
    #[error("Reasoning service failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: ReasoningError,
    },

    #[error("Reasoning client misconfigured: {0}")]
    Misconfigured(String),
}

impl ReasoningServiceError {
    /// The error returned by the final attempt, if any attempt was made.
    pub fn last_error(&self) -> Option<&ReasoningError> {
        match self {
            ReasoningServiceError::Exhausted { last, .. } => Some(last),
            ReasoningServiceError::Misconfigured(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReasoningError>;
