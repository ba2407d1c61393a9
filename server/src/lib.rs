//! # Exam Server Library
//!
//! Coordinates a timed multiple-choice exam between one instructor and many
//! concurrently connected students.
//!
//! ## Session flow
//!
//! Every accepted TCP connection gets its own [`session::Session`] task:
//! login, registration in the [`registry::ClientRegistry`], a wait on the
//! [`barrier::StartBarrier`], delivery of the configuration and a personally
//! shuffled question set, then a single blocking receive of the student's
//! result, which is appended to the [`result_store::ResultStore`]. Errors end
//! the affected session only.
//!
//! ## Instructor control
//!
//! The instructor console runs on a separate thread and sends
//! [`instructor::InstructorCommand`]s to the server loop, which applies them
//! to the shared [`state::ExamState`]. Starting the exam releases every
//! registered student at once.
//!
//! ## Files
//!
//! - question bank, seven lines per question
//! - rules file with the per-question time limit, marking scheme and
//!   questions per exam
//! - append-only result log, one `|`-delimited line per finished exam,
//!   written under an exclusive file lock
//! - student and instructor credential directories
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::directory::Directory;
//! use server::network::Server;
//! use server::state::{ExamFiles, ExamState};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory =
//!         Directory::load("student_dtls.txt".as_ref(), "instructor_dtls.txt".as_ref())?;
//!     let exam = Arc::new(ExamState::load(
//!         Arc::new(directory),
//!         ExamFiles {
//!             questions: "questions_with_difficulty.txt".into(),
//!             results: "results.txt".into(),
//!             rules: "rules.txt".into(),
//!         },
//!     )?);
//!
//!     let mut server = Server::new("127.0.0.1:8080", exam).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod barrier;
pub mod dashboard;
pub mod directory;
pub mod error;
pub mod instructor;
pub mod network;
pub mod question_store;
pub mod registry;
pub mod result_store;
pub mod rules;
pub mod session;
pub mod state;
