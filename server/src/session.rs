//! Per-connection session handler
//!
//! Drives one student from login to result receipt. Any send or receive
//! failure ends this session only; the registry entry is always removed on
//! the way out.

use crate::error::{Result, ServerError};
use crate::state::ExamState;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ExamChannel, ExamResult, LoginReply};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Server-side session lifecycle. Answering questions happens on the client
/// between `Delivering` and `AwaitingResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Authenticating,
    Registered,
    AwaitingStart,
    Delivering,
    AwaitingResult,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connected => "connected",
            SessionState::Authenticating => "authenticating",
            SessionState::Registered => "registered",
            SessionState::AwaitingStart => "awaiting start",
            SessionState::Delivering => "delivering",
            SessionState::AwaitingResult => "awaiting result",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Bad credentials or a full roster
    Rejected,
    /// Result received and appended to the log
    Submitted(ExamResult),
    /// Peer vanished or sent garbage, or the result could not be stored
    Dropped,
}

/// One student connection, from login until the result is stored.
///
/// The session owns its stream and walks [`SessionState`] forward only. It
/// never touches another session; everything shared goes through
/// [`ExamState`].
pub struct Session<S> {
    id: u32,
    addr: SocketAddr,
    channel: ExamChannel<S>,
    exam: Arc<ExamState>,
    phase: SessionState,
    roll: Option<String>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an accepted stream. `id` must come from
    /// [`ExamState::allocate_session_id`] so that registry order follows
    /// connection order.
    pub fn new(id: u32, addr: SocketAddr, stream: S, exam: Arc<ExamState>) -> Self {
        Self {
            id,
            addr,
            channel: ExamChannel::new(stream),
            exam,
            phase: SessionState::Connected,
            roll: None,
        }
    }

    /// Runs the session to completion and deregisters it.
    pub async fn run(mut self) -> SessionOutcome {
        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    ServerError::Protocol(p) if p.is_disconnect() => info!(
                        "Session {} ({}) disconnected while {}",
                        self.id, self.addr, self.phase
                    ),
                    ServerError::Protocol(_) => warn!(
                        "Session {} ({}) failed while {}: {}",
                        self.id, self.addr, self.phase, e
                    ),
                    _ => error!(
                        "Session {} ({}) failed while {}: {}",
                        self.id, self.addr, self.phase, e
                    ),
                }
                SessionOutcome::Dropped
            }
        };

        self.close().await;
        outcome
    }

    async fn drive(&mut self) -> Result<SessionOutcome> {
        self.transition(SessionState::Authenticating);
        let request = self.channel.recv_login().await?;

        let Some(profile) = self
            .exam
            .credentials()
            .verify_student(&request.roll, &request.password)
        else {
            info!("Rejected login for roll {} from {}", request.roll, self.addr);
            self.channel.send_login_reply(&LoginReply::Rejected).await?;
            return Ok(SessionOutcome::Rejected);
        };

        let registered = self
            .exam
            .registry
            .lock()
            .await
            .register(self.id, &request.roll, self.addr);
        if !registered {
            self.channel.send_login_reply(&LoginReply::Rejected).await?;
            return Ok(SessionOutcome::Rejected);
        }
        self.roll = Some(request.roll.clone());
        self.transition(SessionState::Registered);
        self.channel
            .send_login_reply(&LoginReply::Accepted(profile))
            .await?;

        self.transition(SessionState::AwaitingStart);
        if self.exam.barrier.is_started() {
            warn!(
                "Roll {} joined after the exam started, delivering immediately",
                request.roll
            );
        }
        self.exam.barrier.await_start().await;

        self.transition(SessionState::Delivering);
        let mut rng = StdRng::from_entropy();
        let (config, questions) = self.exam.prepare_exam(&mut rng).await;

        self.channel.send_start().await?;
        self.channel.send_config(&config).await?;
        for question in &questions {
            self.channel.send_question(question).await?;
        }
        debug!(
            "Session {} sent {} questions to roll {}",
            self.id,
            questions.len(),
            request.roll
        );

        self.transition(SessionState::AwaitingResult);
        let result = self.channel.recv_result().await?;
        if result.roll != request.roll {
            warn!(
                "Session {} logged in as {} but submitted a result for {}",
                self.id, request.roll, result.roll
            );
        }

        self.exam.results.append(&result).await?;
        info!(
            "Recorded result for {}: {}/{} correct in {}s",
            result.roll, result.correct_answers, result.attempted, result.total_time
        );
        Ok(SessionOutcome::Submitted(result))
    }

    async fn close(&mut self) {
        self.transition(SessionState::Closed);
        self.exam.registry.lock().await.deregister(self.id);
        if let Some(roll) = &self.roll {
            debug!("Session {} for {} closed", self.id, roll);
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} ({}): {} -> {}", self.id, self.addr, self.phase, next);
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use shared::{LoginRequest, Question};
    use std::time::Duration;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn spawn_session(
        exam: &Arc<ExamState>,
    ) -> (ExamChannel<DuplexStream>, JoinHandle<SessionOutcome>) {
        let (client, server) = duplex(64 * 1024);
        let session = Session::new(exam.allocate_session_id(), addr(), server, Arc::clone(exam));
        (ExamChannel::new(client), tokio::spawn(session.run()))
    }

    async fn login(
        channel: &mut ExamChannel<DuplexStream>,
        roll: &str,
        password: &str,
    ) -> LoginReply {
        channel
            .send_login(&LoginRequest {
                roll: roll.to_string(),
                password: password.to_string(),
            })
            .await
            .unwrap();
        channel.recv_login_reply().await.unwrap()
    }

    async fn wait_for_registrations(exam: &ExamState, count: usize) {
        for _ in 0..200 {
            if exam.registry.lock().await.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} registrations", count);
    }

    fn sample_result(roll: &str, name: &str, questions: &[Question]) -> ExamResult {
        ExamResult {
            roll: roll.to_string(),
            name: name.to_string(),
            response_times: vec![7; questions.len()],
            total_time: 7 * questions.len() as u32,
            correct_answers: 2,
            attempted: questions.len() as u32,
            rank: 0,
            flagged: false,
        }
    }

    #[tokio::test]
    async fn test_rejected_login_closes_without_registering() {
        let exam = Arc::new(test_state("session-reject"));
        let (mut client, handle) = spawn_session(&exam);

        assert_eq!(login(&mut client, "21CS001", "wrong").await, LoginReply::Rejected);
        assert_eq!(handle.await.unwrap(), SessionOutcome::Rejected);
        assert!(exam.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_full_session() {
        let exam = Arc::new(test_state("session-full"));
        let (mut client, handle) = spawn_session(&exam);

        match login(&mut client, "21CS001", "pw1").await {
            LoginReply::Accepted(profile) => {
                assert_eq!(profile.name, "Asha");
                assert_eq!(profile.reg_no, "REG001");
            }
            LoginReply::Rejected => panic!("valid login rejected"),
        }

        wait_for_registrations(&exam, 1).await;
        exam.start_exam().await.unwrap();

        client.recv_start().await.unwrap();
        let config = client.recv_config().await.unwrap();
        assert!(config.is_valid());

        let mut questions = Vec::new();
        for _ in 0..config.question_count {
            let question = client.recv_question().await.unwrap();
            assert!(question.is_valid());
            questions.push(question);
        }

        let result = sample_result("21CS001", "Asha", &questions);
        client.send_result(&result).await.unwrap();

        assert_eq!(handle.await.unwrap(), SessionOutcome::Submitted(result.clone()));
        assert!(exam.registry.lock().await.is_empty());
        assert_eq!(exam.results.reload_all().await.unwrap(), vec![result]);
    }

    #[tokio::test]
    async fn test_disconnect_before_result_records_nothing() {
        let exam = Arc::new(test_state("session-drop"));
        let (mut client, handle) = spawn_session(&exam);

        assert!(matches!(
            login(&mut client, "21CS002", "pw2").await,
            LoginReply::Accepted(_)
        ));
        wait_for_registrations(&exam, 1).await;
        exam.start_exam().await.unwrap();
        client.recv_start().await.unwrap();
        drop(client);

        assert_eq!(handle.await.unwrap(), SessionOutcome::Dropped);
        assert!(exam.registry.lock().await.is_empty());
        assert!(exam.results.reload_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting_for_login() {
        let exam = Arc::new(test_state("session-early"));
        let (client, handle) = spawn_session(&exam);
        drop(client);

        assert_eq!(handle.await.unwrap(), SessionOutcome::Dropped);
        assert!(exam.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_all_waiting_sessions_start_together() {
        let exam = Arc::new(test_state("session-barrier"));
        let (mut first, first_handle) = spawn_session(&exam);
        let (mut second, second_handle) = spawn_session(&exam);

        login(&mut first, "21CS001", "pw1").await;
        login(&mut second, "21CS002", "pw2").await;
        wait_for_registrations(&exam, 2).await;

        let early = tokio::time::timeout(Duration::from_millis(50), first.recv_start()).await;
        assert!(early.is_err(), "start marker sent before trigger");

        assert_eq!(exam.start_exam().await.unwrap(), 2);
        first.recv_start().await.unwrap();
        second.recv_start().await.unwrap();

        drop(first);
        drop(second);
        assert_eq!(first_handle.await.unwrap(), SessionOutcome::Dropped);
        assert_eq!(second_handle.await.unwrap(), SessionOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_unstorable_result_dropped() {
        let exam = Arc::new(test_state("session-unstorable"));
        let (mut client, handle) = spawn_session(&exam);

        login(&mut client, "21CS001", "pw1").await;
        wait_for_registrations(&exam, 1).await;
        exam.start_exam().await.unwrap();

        client.recv_start().await.unwrap();
        let config = client.recv_config().await.unwrap();
        for _ in 0..config.question_count {
            client.recv_question().await.unwrap();
        }

        let mut result = sample_result("21CS001", "Asha|Admin", &[]);
        result.attempted = 0;
        client.send_result(&result).await.unwrap();

        assert_eq!(handle.await.unwrap(), SessionOutcome::Dropped);
        assert!(exam.results.reload_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::AwaitingStart.to_string(), "awaiting start");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
