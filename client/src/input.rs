//! Terminal input
//!
//! Stdin is read on a dedicated thread and every line is forwarded over a
//! channel, so the exam loop can wait for an answer with a deadline instead
//! of blocking on the terminal.

use log::debug;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;

/// Spawns the stdin reader. The channel closes when stdin does.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        forward_lines(stdin.lock(), &tx);
        debug!("Stdin closed");
    });

    rx
}

/// Forwards lines until the reader ends or the receiver is dropped.
pub fn forward_lines<R: BufRead>(reader: R, tx: &mpsc::UnboundedSender<String>) {
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        if tx.send(line).is_err() {
            break;
        }
    }
}

/// Prints `label` and waits for the next line. `None` once input has closed.
pub async fn prompt(lines: &mut mpsc::UnboundedReceiver<String>, label: &str) -> Option<String> {
    print!("{}", label);
    let _ = std::io::stdout().flush();
    lines.recv().await.map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_forward_lines() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(Cursor::new("21CS001\npw1\nB\n"), &tx);
        drop(tx);

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["21CS001", "pw1", "B"]);
    }

    #[test]
    fn test_forward_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        forward_lines(Cursor::new("a\nb\n"), &tx);
    }

    #[tokio::test]
    async fn test_prompt_trims_and_reports_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("  21CS001  ".to_string()).unwrap();
        drop(tx);

        assert_eq!(prompt(&mut rx, "Roll: ").await.as_deref(), Some("21CS001"));
        assert_eq!(prompt(&mut rx, "Roll: ").await, None);
    }
}
