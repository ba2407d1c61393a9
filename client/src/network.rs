//! Student side of the exam protocol

use crate::error::{ClientError, Result};
use log::{debug, info, warn};
use shared::{
    ExamChannel, ExamConfig, ExamResult, LoginReply, LoginRequest, Question, StudentProfile,
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Everything the server hands out once the exam starts
#[derive(Debug, Clone, PartialEq)]
pub struct ExamPaper {
    pub config: ExamConfig,
    /// In delivery order; records that failed validation are kept so the
    /// exam can count them as attempted and wrong.
    pub questions: Vec<Question>,
}

/// Student side of one exam connection.
///
/// Each method performs the next step of the exchange in order: login,
/// wait for the start, receive the paper, submit. Calling them out of order
/// reads the wrong message and fails with a protocol error.
pub struct ExamClient<S> {
    channel: ExamChannel<S>,
}

impl ExamClient<TcpStream> {
    /// Connects to the exam server over TCP.
    pub async fn connect(server_addr: &str) -> Result<Self> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> ExamClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            channel: ExamChannel::new(stream),
        }
    }

    pub async fn login(&mut self, roll: &str, password: &str) -> Result<StudentProfile> {
        self.channel
            .send_login(&LoginRequest {
                roll: roll.to_string(),
                password: password.to_string(),
            })
            .await?;

        match self.channel.recv_login_reply().await? {
            LoginReply::Accepted(profile) => {
                info!("Logged in as {} ({})", profile.name, profile.reg_no);
                Ok(profile)
            }
            LoginReply::Rejected => Err(ClientError::Rejected),
        }
    }

    /// Waits for the start marker, giving up after `limit`.
    pub async fn wait_for_start(&mut self, limit: Duration) -> Result<()> {
        match tokio::time::timeout(limit, self.channel.recv_start()).await {
            Ok(received) => Ok(received?),
            Err(_) => Err(ClientError::StartTimeout(limit)),
        }
    }

    /// Receives the configuration and the questions, clamping any
    /// out-of-range configuration value to its default.
    pub async fn receive_paper(&mut self) -> Result<ExamPaper> {
        let received = self.channel.recv_config().await?;
        let config = received.sanitized();
        if config != received {
            warn!(
                "Received out-of-range configuration {:?}, using {:?}",
                received, config
            );
        }

        let mut questions = Vec::with_capacity(config.question_count as usize);
        for index in 0..config.question_count {
            let question = self.channel.recv_question().await?;
            if question.is_valid() {
                debug!("Received question {}: {}", index + 1, question.text);
            } else {
                warn!("Received invalid question {}, it will be skipped", index + 1);
            }
            questions.push(question);
        }

        Ok(ExamPaper { config, questions })
    }

    /// Sends the finished result. The server closes the connection afterwards.
    pub async fn submit(&mut self, result: &ExamResult) -> Result<()> {
        self.channel.send_result(result).await?;
        info!("Sent exam result to server");
        Ok(())
    }
}
