//! Error types for the operator CLI.

use a11y_lab::LabError;

/// All errors that can occur while driving an experiment session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Lab(#[from] LabError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No tokio runtime available for notification timers: {0}")]
    Runtime(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),
}

impl SessionError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Lab(LabError::MalformedConfig(_))
            | SessionError::Lab(LabError::InvalidExperiment { .. })
            | SessionError::Lab(LabError::EmptyExperimentList) => 3,
            SessionError::InvalidArgs(_) => 2,
            SessionError::PageNotFound(_) | SessionError::Lab(LabError::HostNotFound(_)) => 4,
            _ => 1,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
