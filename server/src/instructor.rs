//! Instructor console and the commands it sends to the server loop
//!
//! The console runs on its own OS thread reading stdin. Each menu choice
//! becomes an [`InstructorCommand`] sent over a channel; the server loop
//! applies it to the shared exam state and replies with a status line.

use crate::dashboard;
use crate::directory::CredentialStore;
use crate::error::Result;
use crate::state::ExamState;
use log::{info, warn};
use shared::{ExamConfig, Question};
use std::io::{self, BufRead, Write};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq)]
pub enum InstructorCommand {
    SetTimeLimit(i32),
    AddQuestion(Question),
    SetMarkingScheme { correct: f32, wrong: f32 },
    ViewDashboard,
    StartExam,
    Exit,
}

/// A command plus the channel its status line goes back on
#[derive(Debug)]
pub struct InstructorRequest {
    pub command: InstructorCommand,
    pub reply: oneshot::Sender<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Report(String),
    Shutdown,
}

/// Applies one instructor command to the exam state.
pub async fn process_instructor_command(
    exam: &ExamState,
    command: InstructorCommand,
) -> Result<CommandOutcome> {
    info!("Instructor command: {:?}", command);

    let report = match command {
        InstructorCommand::SetTimeLimit(seconds) => {
            let config = exam.set_time_limit(seconds).await?;
            format!("Time limit per question is now {}s", config.answer_timeout)
        }
        InstructorCommand::AddQuestion(question) => {
            let total = exam.add_question(&question).await?;
            format!("Question added, {} questions loaded", total)
        }
        InstructorCommand::SetMarkingScheme { correct, wrong } => {
            let config = exam.set_marking_scheme(correct, wrong).await?;
            format!(
                "Marking scheme is now +{:.2} / -{:.2}",
                config.marks_correct, config.marks_wrong
            )
        }
        InstructorCommand::ViewDashboard => {
            let results = exam.dashboard().await?;
            dashboard::render_dashboard(&results)
        }
        InstructorCommand::StartExam => {
            let released = exam.start_exam().await?;
            format!("Exam started for {} students", released)
        }
        InstructorCommand::Exit => return Ok(CommandOutcome::Shutdown),
    };

    Ok(CommandOutcome::Report(report))
}

/// Prompts for instructor credentials. `instructor_id` skips the id prompt.
pub fn login<R: BufRead, W: Write>(
    credentials: &dyn CredentialStore,
    instructor_id: Option<String>,
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<String>> {
    let id = match instructor_id {
        Some(id) => id,
        None => match prompt(input, output, "Instructor ID: ")? {
            Some(id) => id,
            None => return Ok(None),
        },
    };
    let Some(password) = prompt(input, output, "Password: ")? else {
        return Ok(None);
    };

    let name = credentials.verify_instructor(&id, &password);
    match &name {
        Some(name) => info!("Instructor {} ({}) logged in", name, id),
        None => warn!("Instructor login failed for {}", id),
    }
    Ok(name)
}

/// Menu loop. Returns after `Exit` is chosen, stdin closes, or the server
/// loop goes away.
pub fn run_console<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    commands: mpsc::UnboundedSender<InstructorRequest>,
) -> io::Result<()> {
    loop {
        writeln!(output)?;
        writeln!(output, "1. Set time limit per question")?;
        writeln!(output, "2. Add question")?;
        writeln!(output, "3. Set marking scheme")?;
        writeln!(output, "4. View dashboard")?;
        writeln!(output, "5. Start exam")?;
        writeln!(output, "6. Exit")?;

        let Some(choice) = prompt(input, output, "Choice: ")? else {
            send(&commands, InstructorCommand::Exit);
            return Ok(());
        };

        let command = match choice.as_str() {
            "1" => read_time_limit(input, output)?,
            "2" => read_question(input, output)?,
            "3" => read_marking_scheme(input, output)?,
            "4" => Some(InstructorCommand::ViewDashboard),
            "5" => Some(InstructorCommand::StartExam),
            "6" => Some(InstructorCommand::Exit),
            _ => {
                writeln!(output, "Invalid choice")?;
                None
            }
        };

        let Some(command) = command else {
            continue;
        };
        let exiting = command == InstructorCommand::Exit;

        match send(&commands, command) {
            Some(report) => writeln!(output, "{}", report)?,
            None => return Ok(()),
        }
        if exiting {
            return Ok(());
        }
    }
}

/// Sends a command and blocks until the server loop answers.
fn send(
    commands: &mpsc::UnboundedSender<InstructorRequest>,
    command: InstructorCommand,
) -> Option<String> {
    let (reply, response) = oneshot::channel();
    commands.send(InstructorRequest { command, reply }).ok()?;
    response.blocking_recv().ok()
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> io::Result<Option<String>> {
    write!(output, "{}", label)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn read_time_limit<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<InstructorCommand>> {
    let Some(text) = prompt(input, output, "Seconds per question: ")? else {
        return Ok(None);
    };
    match text.parse::<i32>() {
        Ok(seconds) if ExamConfig::sanitize_timeout(seconds) == seconds => {
            Ok(Some(InstructorCommand::SetTimeLimit(seconds)))
        }
        _ => {
            writeln!(output, "Time limit must be between 1 and {}", shared::MAX_ANSWER_TIMEOUT)?;
            Ok(None)
        }
    }
}

fn read_marking_scheme<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<InstructorCommand>> {
    let correct = prompt(input, output, "Marks for a correct answer: ")?;
    let wrong = prompt(input, output, "Marks deducted for a wrong answer: ")?;

    match (
        correct.and_then(|c| c.parse::<f32>().ok()),
        wrong.and_then(|w| w.parse::<f32>().ok()),
    ) {
        (Some(correct), Some(wrong))
            if ExamConfig::sanitize_marks_correct(correct) == correct
                && ExamConfig::sanitize_marks_wrong(wrong) == wrong =>
        {
            Ok(Some(InstructorCommand::SetMarkingScheme { correct, wrong }))
        }
        _ => {
            writeln!(output, "Marks must be within 0 and {}", shared::MAX_MARKS)?;
            Ok(None)
        }
    }
}

fn read_question<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<InstructorCommand>> {
    let mut fields = Vec::with_capacity(7);
    for label in [
        "Question: ",
        "Option A: ",
        "Option B: ",
        "Option C: ",
        "Option D: ",
        "Correct option (A-D): ",
        "Difficulty (1-3): ",
    ] {
        match prompt(input, output, label)? {
            Some(field) => fields.push(field),
            None => return Ok(None),
        }
    }

    let question = Question {
        text: fields[0].clone(),
        options: [
            fields[1].clone(),
            fields[2].clone(),
            fields[3].clone(),
            fields[4].clone(),
        ],
        correct: fields[5]
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or(' '),
        difficulty: fields[6].parse().unwrap_or(0),
    };

    if !question.is_valid() {
        writeln!(output, "Question rejected: every field is required, answer A-D, difficulty 1-3")?;
        return Ok(None);
    }
    Ok(Some(InstructorCommand::AddQuestion(question)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Directory;
    use crate::error::ServerError;
    use crate::state::tests::test_state;
    use std::io::Cursor;

    fn run_scripted(script: &str) -> (Vec<InstructorCommand>, String) {
        let (tx, mut rx) = mpsc::unbounded_channel::<InstructorRequest>();
        let script = script.to_string();

        let console = std::thread::spawn(move || {
            let mut input = Cursor::new(script.into_bytes());
            let mut output = Vec::new();
            run_console(&mut input, &mut output, tx).unwrap();
            String::from_utf8(output).unwrap()
        });

        let mut commands = Vec::new();
        while let Some(request) = rx.blocking_recv() {
            commands.push(request.command.clone());
            let _ = request.reply.send("ok".to_string());
        }
        (commands, console.join().unwrap())
    }

    #[test]
    fn test_console_parses_menu() {
        let script = "1\n45\n3\n2\n0.5\n4\n5\n6\n";
        let (commands, output) = run_scripted(script);

        assert_eq!(
            commands,
            vec![
                InstructorCommand::SetTimeLimit(45),
                InstructorCommand::SetMarkingScheme {
                    correct: 2.0,
                    wrong: 0.5
                },
                InstructorCommand::ViewDashboard,
                InstructorCommand::StartExam,
                InstructorCommand::Exit,
            ]
        );
        assert!(output.contains("6. Exit"));
    }

    #[test]
    fn test_console_reads_question() {
        let script = "2\nLargest planet?\nMars\nJupiter\nVenus\nEarth\nb\n2\n6\n";
        let (commands, _) = run_scripted(script);

        assert_eq!(
            commands[0],
            InstructorCommand::AddQuestion(Question::new(
                "Largest planet?",
                ["Mars", "Jupiter", "Venus", "Earth"],
                'B',
                2
            ))
        );
    }

    #[test]
    fn test_console_refuses_bad_input() {
        let script = "9\n1\n0\n1\nabc\n2\nQ\nA\nB\nC\nD\nZ\n1\n6\n";
        let (commands, output) = run_scripted(script);

        assert_eq!(commands, vec![InstructorCommand::Exit]);
        assert!(output.contains("Invalid choice"));
        assert!(output.contains("Question rejected"));
    }

    #[test]
    fn test_console_exits_on_eof() {
        let (commands, _) = run_scripted("4\n");
        assert_eq!(
            commands,
            vec![InstructorCommand::ViewDashboard, InstructorCommand::Exit]
        );
    }

    #[test]
    fn test_login() {
        let directory = Directory::new().with_instructor("Meera", "INS01", "secret");

        let mut input = Cursor::new(b"INS01\nsecret\n".to_vec());
        let mut output = Vec::new();
        let name = login(&directory, None, &mut input, &mut output).unwrap();
        assert_eq!(name.as_deref(), Some("Meera"));

        let mut input = Cursor::new(b"nope\n".to_vec());
        let name = login(&directory, Some("INS01".to_string()), &mut input, &mut output).unwrap();
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn test_process_start_without_students() {
        let exam = test_state("instructor-start");
        let result = process_instructor_command(&exam, InstructorCommand::StartExam).await;
        assert!(matches!(result, Err(ServerError::NoStudentsRegistered)));
    }

    #[tokio::test]
    async fn test_process_commands() {
        let exam = test_state("instructor-commands");

        let outcome = process_instructor_command(&exam, InstructorCommand::SetTimeLimit(60))
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Report(ref s) if s.contains("60s")));
        assert_eq!(exam.config().await.answer_timeout, 60);

        let outcome = process_instructor_command(&exam, InstructorCommand::ViewDashboard)
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Report(ref s) if s.contains("No results")));

        let outcome = process_instructor_command(&exam, InstructorCommand::Exit)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Shutdown);
    }
}
