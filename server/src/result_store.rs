//! Append-only result log.
//!
//! One line per completed exam:
//!
//! ```text
//! roll|name|correctCount|attemptedCount|flagged|totalTime|t1,t2,...,tn,
//! ```
//!
//! Appends hold an exclusive lock on the log file for the duration of a
//! single write of one complete line; reloads hold a shared lock, so a reader
//! only ever sees whole lines.

use crate::error::{Result, ServerError};
use fs2::FileExt;
use log::{debug, warn};
use shared::{ExamResult, MAX_EXAM_QUESTIONS};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Handle to the result log on disk.
///
/// Cloning is cheap; every clone appends to and reloads from the same file,
/// and the file lock is what serializes concurrent writers.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    /// Creates a handle for the log at `path`. The file is created on the
    /// first append, so a fresh exam can point at a path that does not
    /// exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one result as a single locked write.
    pub async fn append(&self, result: &ExamResult) -> Result<()> {
        if !result.has_storable_fields() {
            return Err(ServerError::UnstorableResult(result.roll.clone()));
        }

        let line = format_result_line(result);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_line(&path, &line)).await??;

        debug!("Appended result for roll {}", result.roll);
        Ok(())
    }

    /// Parses every line of the log. Lines that are not UTF-8 or cannot be
    /// parsed are logged and skipped; a missing log reads as empty.
    pub async fn reload_all(&self) -> Result<Vec<ExamResult>> {
        let path = self.path.clone();
        let bytes = tokio::task::spawn_blocking(move || read_log(&path)).await??;

        let mut results = Vec::new();
        for (index, raw) in bytes.split(|&b| b == b'\n').enumerate() {
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Skipping result line {}: {}", index + 1, e);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_result_line(line) {
                Ok(result) => results.push(result),
                Err(e) => warn!("Skipping result line {}: {}", index + 1, e),
            }
        }
        Ok(results)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    FileExt::lock_exclusive(&file)?;
    let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
    let unlocked = FileExt::unlock(&file);

    written?;
    unlocked?;
    Ok(())
}

fn read_log(path: &Path) -> Result<Vec<u8>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    FileExt::lock_shared(&file)?;
    let mut bytes = Vec::new();
    let read = file.read_to_end(&mut bytes);
    let unlocked = FileExt::unlock(&file);

    read?;
    unlocked?;
    Ok(bytes)
}

/// One complete log line, newline included. At most
/// `MAX_EXAM_QUESTIONS` response times are written.
pub fn format_result_line(result: &ExamResult) -> String {
    let mut line = format!(
        "{}|{}|{}|{}|{}|{}|",
        result.roll,
        result.name,
        result.correct_answers,
        result.attempted,
        u8::from(result.flagged),
        result.total_time
    );
    for time in result.response_times.iter().take(MAX_EXAM_QUESTIONS) {
        line.push_str(&time.to_string());
        line.push(',');
    }
    line.push('\n');
    line
}

/// Inverse of [`format_result_line`].
pub fn parse_result_line(line: &str) -> Result<ExamResult> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let mut fields = line.splitn(7, '|');

    let mut required = |name: &str| {
        fields
            .next()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ServerError::malformed(format!("missing {} in '{}'", name, line)))
    };

    let roll = required("roll")?.to_string();
    let name = required("name")?.to_string();
    let correct_answers = number(required("correct count")?, line)?;
    let attempted = number(required("attempted count")?, line)?;
    let flagged = number(required("flag")?, line)? != 0;
    let total_time = number(required("total time")?, line)?;

    let response_times = fields
        .next()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .take(MAX_EXAM_QUESTIONS)
        .map(|token| number(token, line))
        .collect::<Result<Vec<u32>>>()?;

    Ok(ExamResult {
        roll,
        name,
        response_times,
        total_time,
        correct_answers,
        attempted,
        rank: 0,
        flagged,
    })
}

fn number(value: &str, line: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::malformed(format!("bad number '{}' in '{}'", value, line)))
}
