//! Server network layer: TCP accept loop and instructor command dispatch

use crate::instructor::{process_instructor_command, CommandOutcome, InstructorRequest};
use crate::session::{Session, SessionOutcome};
use crate::state::ExamState;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Accepts student connections and applies instructor commands
pub struct Server {
    listener: TcpListener,
    exam: Arc<ExamState>,

    command_tx: mpsc::UnboundedSender<InstructorRequest>,
    command_rx: mpsc::UnboundedReceiver<InstructorRequest>,
}

impl Server {
    /// Binds the listener and creates the instructor command channel.
    ///
    /// Nothing is accepted until [`Server::run`] is called, so the caller can
    /// hand out [`Server::command_sender`] to the console first.
    pub async fn new(addr: &str, exam: Arc<ExamState>) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (command_tx, command_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            exam,
            command_tx,
            command_rx,
        })
    }

    /// Address actually bound, useful when binding to port 0
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Channel the instructor console sends its commands on
    pub fn command_sender(&self) -> mpsc::UnboundedSender<InstructorRequest> {
        self.command_tx.clone()
    }

    fn spawn_session(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let id = self.exam.allocate_session_id();
        let session = Session::new(id, addr, stream, Arc::clone(&self.exam));
        debug!("Accepted connection {} from {}", id, addr);

        tokio::spawn(async move {
            match session.run().await {
                SessionOutcome::Submitted(result) => {
                    debug!("Session {} finished with a result for {}", id, result.roll)
                }
                SessionOutcome::Rejected => debug!("Session {} rejected", id),
                SessionOutcome::Dropped => debug!("Session {} dropped", id),
            }
        });
    }

    /// Returns false once the instructor asked to shut down.
    async fn handle_request(&self, request: InstructorRequest) -> bool {
        let (report, keep_running) =
            match process_instructor_command(&self.exam, request.command).await {
                Ok(CommandOutcome::Report(report)) => (report, true),
                Ok(CommandOutcome::Shutdown) => ("Shutting down".to_string(), false),
                Err(e) => {
                    warn!("Instructor command failed: {}", e);
                    (format!("Error: {}", e), true)
                }
            };

        // The console may have gone away; the command still took effect.
        let _ = request.reply.send(report);
        keep_running
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_session(stream, addr),
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                },

                request = self.command_rx.recv() => {
                    match request {
                        Some(request) => {
                            if !self.handle_request(request).await {
                                info!("Server shutting down");
                                break;
                            }
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructor::InstructorCommand;
    use crate::state::tests::test_state;
    use tokio::sync::oneshot;

    async fn send_command(
        commands: &mpsc::UnboundedSender<InstructorRequest>,
        command: InstructorCommand,
    ) -> String {
        let (reply, response) = oneshot::channel();
        commands.send(InstructorRequest { command, reply }).unwrap();
        response.await.unwrap()
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let exam = Arc::new(test_state("network-bind"));
        let server = Server::new("127.0.0.1:0", exam).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_commands_dispatched_and_exit_stops_loop() {
        let exam = Arc::new(test_state("network-commands"));
        let mut server = Server::new("127.0.0.1:0", Arc::clone(&exam)).await.unwrap();
        let commands = server.command_sender();
        let handle = tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let report = send_command(&commands, InstructorCommand::StartExam).await;
        assert!(report.starts_with("Error"));
        assert!(!exam.barrier.is_started());

        let report = send_command(&commands, InstructorCommand::SetTimeLimit(20)).await;
        assert!(report.contains("20s"));

        let report = send_command(&commands, InstructorCommand::Exit).await;
        assert_eq!(report, "Shutting down");
        assert!(handle.await.unwrap().is_ok());
    }
}
