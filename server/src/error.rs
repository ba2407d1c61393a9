use shared::ProtocolError;
use thiserror::Error;

/// Errors raised by the exam server's stores, files and coordination primitives
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A result-log line that lacks a required field
    #[error("Malformed result line: {0}")]
    MalformedResult(String),

    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Result for roll {0} cannot be stored")]
    UnstorableResult(String),

    #[error("No students registered for the exam")]
    NoStudentsRegistered,

    #[error("Exam has already been started")]
    AlreadyStarted,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ServerError::MalformedResult(msg.into())
    }
}
