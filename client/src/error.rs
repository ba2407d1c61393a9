use shared::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Errors that end the student's exam session
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid credentials")]
    Rejected,

    #[error("Exam did not start within {0:?}")]
    StartTimeout(Duration),

    #[error("Input closed before login completed")]
    InputClosed,
}

pub type Result<T> = std::result::Result<T, ClientError>;
