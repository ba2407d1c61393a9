//! Framed wire protocol between the exam server and student clients.
//!
//! Messages are not tagged: their meaning comes from their position in the
//! session (login, start marker, four configuration scalars, questions, result).
//! Every message travels in one frame:
//!
//! ```text
//! [version: u8][payload length: u32 big-endian][payload]
//! ```
//!
//! Scalars and records are bincode encoded with fixed field order. Scalar
//! frames are length-checked individually by the receiver.

use crate::{
    ExamConfig, ExamResult, Question, StudentProfile, LOGIN_REJECTED, MAX_EXAM_QUESTIONS,
    START_MARKER,
};
use bincode::{deserialize, serialize, serialized_size};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const WIRE_VERSION: u8 = 1;
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Encoded size of every configuration scalar (`i32` and `f32`)
const SCALAR_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Unsupported wire version {0}")]
    VersionMismatch(u8),

    #[error("Frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    #[error("Expected a {expected} byte frame, received {actual} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Text frame is not valid UTF-8")]
    InvalidText,

    #[error("Unexpected message: {0}")]
    Unexpected(String),
}

impl ProtocolError {
    /// True when the peer went away rather than sending something malformed.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::Io(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Writes one frame: version byte, big-endian `u32` length, payload.
///
/// The whole frame goes out in a single `write_all` followed by a flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(payload.len() + 5);
    frame.push(WIRE_VERSION);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame, rejecting unknown versions and oversized lengths before
/// allocating the payload buffer.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let version = reader.read_u8().await?;
    if version != WIRE_VERSION {
        return Err(ProtocolError::VersionMismatch(version));
    }

    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// `"<roll>|<password>"` sent by the student as its first message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub roll: String,
    pub password: String,
}

impl LoginRequest {
    pub fn encode(&self) -> String {
        format!("{}|{}", self.roll, self.password)
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let (roll, password) = text
            .split_once('|')
            .ok_or_else(|| ProtocolError::Unexpected(format!("malformed login '{}'", text)))?;

        Ok(Self {
            roll: roll.trim().to_string(),
            password: password.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    Accepted(StudentProfile),
    Rejected,
}

impl LoginReply {
    pub fn encode(&self) -> String {
        match self {
            LoginReply::Accepted(profile) => format!("{}|{}", profile.name, profile.reg_no),
            LoginReply::Rejected => LOGIN_REJECTED.to_string(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text == LOGIN_REJECTED {
            return Ok(LoginReply::Rejected);
        }

        let (name, reg_no) = text
            .split_once('|')
            .ok_or_else(|| ProtocolError::Unexpected(format!("malformed login reply '{}'", text)))?;

        Ok(LoginReply::Accepted(StudentProfile {
            name: name.to_string(),
            reg_no: reg_no.to_string(),
        }))
    }
}

/// Typed view over a byte stream speaking the exam protocol.
///
/// Used by the server session handler and by the student client, so both
/// ends agree on framing and message order by construction.
pub struct ExamChannel<S> {
    stream: S,
}

impl<S> ExamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> S {
        self.stream
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        write_frame(&mut self.stream, text.as_bytes()).await
    }

    pub async fn recv_text(&mut self) -> Result<String, ProtocolError> {
        let payload = read_frame(&mut self.stream).await?;
        String::from_utf8(payload).map_err(|_| ProtocolError::InvalidText)
    }

    pub async fn send_login(&mut self, request: &LoginRequest) -> Result<(), ProtocolError> {
        self.send_text(&request.encode()).await
    }

    pub async fn recv_login(&mut self) -> Result<LoginRequest, ProtocolError> {
        let text = self.recv_text().await?;
        LoginRequest::parse(&text)
    }

    pub async fn send_login_reply(&mut self, reply: &LoginReply) -> Result<(), ProtocolError> {
        self.send_text(&reply.encode()).await
    }

    pub async fn recv_login_reply(&mut self) -> Result<LoginReply, ProtocolError> {
        let text = self.recv_text().await?;
        LoginReply::parse(&text)
    }

    pub async fn send_start(&mut self) -> Result<(), ProtocolError> {
        write_frame(&mut self.stream, START_MARKER).await
    }

    pub async fn recv_start(&mut self) -> Result<(), ProtocolError> {
        let payload = read_frame(&mut self.stream).await?;
        if payload.as_slice() != START_MARKER.as_slice() {
            return Err(ProtocolError::Unexpected(format!(
                "expected start marker, received '{}'",
                String::from_utf8_lossy(&payload)
            )));
        }
        Ok(())
    }

    /// Sends the configuration as four separate scalar frames.
    pub async fn send_config(&mut self, config: &ExamConfig) -> Result<(), ProtocolError> {
        self.send_value(&config.answer_timeout).await?;
        self.send_value(&config.marks_correct).await?;
        self.send_value(&config.marks_wrong).await?;
        self.send_value(&config.question_count).await
    }

    /// Receives the four configuration scalars exactly as sent; callers clamp them.
    pub async fn recv_config(&mut self) -> Result<ExamConfig, ProtocolError> {
        let answer_timeout = self.recv_scalar::<i32>().await?;
        let marks_correct = self.recv_scalar::<f32>().await?;
        let marks_wrong = self.recv_scalar::<f32>().await?;
        let question_count = self.recv_scalar::<i32>().await?;

        Ok(ExamConfig {
            answer_timeout,
            marks_correct,
            marks_wrong,
            question_count,
        })
    }

    pub async fn send_question(&mut self, question: &Question) -> Result<(), ProtocolError> {
        self.send_value(question).await
    }

    pub async fn recv_question(&mut self) -> Result<Question, ProtocolError> {
        self.recv_value().await
    }

    pub async fn send_result(&mut self, result: &ExamResult) -> Result<(), ProtocolError> {
        self.send_value(result).await
    }

    pub async fn recv_result(&mut self) -> Result<ExamResult, ProtocolError> {
        let result: ExamResult = self.recv_value().await?;
        if result.response_times.len() > MAX_EXAM_QUESTIONS {
            return Err(ProtocolError::Unexpected(format!(
                "result carries {} response times, capacity is {}",
                result.response_times.len(),
                MAX_EXAM_QUESTIONS
            )));
        }
        Ok(result)
    }

    async fn send_value<T: Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        let data = serialize(value)?;
        write_frame(&mut self.stream, &data).await
    }

    /// Decodes one record and rejects frames with trailing bytes.
    async fn recv_value<T>(&mut self) -> Result<T, ProtocolError>
    where
        T: Serialize + DeserializeOwned,
    {
        let payload = read_frame(&mut self.stream).await?;
        let value: T = deserialize(&payload)?;

        let expected = serialized_size(&value)? as usize;
        if expected != payload.len() {
            return Err(ProtocolError::SizeMismatch {
                expected,
                actual: payload.len(),
            });
        }
        Ok(value)
    }

    async fn recv_scalar<T: DeserializeOwned>(&mut self) -> Result<T, ProtocolError> {
        let payload = read_frame(&mut self.stream).await?;
        if payload.len() != SCALAR_LEN {
            return Err(ProtocolError::SizeMismatch {
                expected: SCALAR_LEN,
                actual: payload.len(),
            });
        }
        Ok(deserialize(&payload)?)
    }
}
