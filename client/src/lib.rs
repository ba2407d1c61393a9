//! # Exam Client Library
//!
//! Student side of the exam: logs in, waits for the instructor's start
//! signal, receives the exam rules and questions, runs the timed exam in the
//! terminal and sends the result back.
//!
//! ## Modules
//!
//! - `network`: protocol driver over a TCP stream (or any async byte stream
//!   in tests)
//! - `exam`: per-question deadlines, the overall exam timer and scoring
//! - `input`: stdin lines forwarded over a channel so answers can be awaited
//!   with a timeout
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::exam::{conduct_exam, ExamTimer};
//! use client::input::spawn_stdin_reader;
//! use client::network::ExamClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut answers = spawn_stdin_reader();
//!     let mut client = ExamClient::connect("127.0.0.1:8080").await?;
//!
//!     let profile = client.login("21CS001", "secret").await?;
//!     client.wait_for_start(Duration::from_secs(300)).await?;
//!     let paper = client.receive_paper().await?;
//!
//!     let timer = ExamTimer::start(Duration::from_secs(300));
//!     let card = conduct_exam(&paper, &mut answers, &timer).await;
//!     client.submit(&card.into_result("21CS001", &profile.name)).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod exam;
pub mod input;
pub mod network;
