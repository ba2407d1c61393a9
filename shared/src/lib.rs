//! Data model and wire protocol shared by the exam server and the student client.
//!
//! Both ends validate what they receive with the same rules, so the predicates
//! and clamping defaults live here rather than in either binary.

use serde::{Deserialize, Serialize};

mod protocol;

pub use protocol::{
    read_frame, write_frame, ExamChannel, LoginReply, LoginRequest, ProtocolError,
    MAX_FRAME_LEN, WIRE_VERSION,
};

pub const SERVER_PORT: u16 = 8080;

/// Upper bound on questions per exam; also the capacity of the response-time sequence.
pub const MAX_EXAM_QUESTIONS: usize = 5;
/// Answers faster than this many seconds are reported as suspicious by the client.
pub const MIN_ANSWER_TIME: u32 = 5;

pub const DEFAULT_ANSWER_TIMEOUT: i32 = 30;
pub const MAX_ANSWER_TIMEOUT: i32 = 3600;
pub const DEFAULT_MARKS_CORRECT: f32 = 1.0;
pub const DEFAULT_MARKS_WRONG: f32 = 0.25;
pub const MAX_MARKS: f32 = 100.0;

/// Start marker, including its terminator byte.
pub const START_MARKER: &[u8; 6] = b"START\0";
pub const LOGIN_REJECTED: &str = "INVALID";

pub const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Score multiplier for a difficulty tier (1 easy, 2 medium, 3 hard).
pub fn difficulty_weight(difficulty: u8) -> Option<f64> {
    match difficulty {
        1 => Some(1.0),
        2 => Some(1.5),
        3 => Some(2.0),
        _ => None,
    }
}

pub fn difficulty_label(difficulty: u8) -> &'static str {
    match difficulty {
        1 => "Easy",
        2 => "Medium",
        3 => "Hard",
        _ => "Unknown",
    }
}

/// A multiple-choice question with four options.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Question {
    pub text: String,
    pub options: [String; 4],
    /// Correct option letter, one of `A`..=`D`
    pub correct: char,
    pub difficulty: u8,
}

impl Question {
    pub fn new(text: &str, options: [&str; 4], correct: char, difficulty: u8) -> Self {
        Self {
            text: text.to_string(),
            options: options.map(str::to_string),
            correct,
            difficulty,
        }
    }

    /// Substituted for any record that fails [`Question::is_valid`].
    pub fn canonical_default() -> Self {
        Self::new(
            "What is the default question?",
            ["Option A", "Option B", "Option C", "Option D"],
            'A',
            1,
        )
    }

    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
            && self.options.iter().all(|option| !option.trim().is_empty())
            && OPTION_LETTERS.contains(&self.correct)
            && (1..=3).contains(&self.difficulty)
    }

    /// Returns the record itself when valid, otherwise the canonical default.
    pub fn or_default(&self) -> Self {
        if self.is_valid() {
            self.clone()
        } else {
            Self::canonical_default()
        }
    }

    pub fn option(&self, letter: char) -> Option<&str> {
        OPTION_LETTERS
            .iter()
            .position(|l| *l == letter)
            .map(|index| self.options[index].as_str())
    }

    pub fn weight(&self) -> f64 {
        difficulty_weight(self.difficulty).unwrap_or(0.0)
    }
}

/// Exam rules handed to every student at start.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ExamConfig {
    /// Seconds allowed per question
    pub answer_timeout: i32,
    pub marks_correct: f32,
    pub marks_wrong: f32,
    pub question_count: i32,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            marks_correct: DEFAULT_MARKS_CORRECT,
            marks_wrong: DEFAULT_MARKS_WRONG,
            question_count: MAX_EXAM_QUESTIONS as i32,
        }
    }
}

impl ExamConfig {
    pub fn sanitize_timeout(value: i32) -> i32 {
        if value > 0 && value <= MAX_ANSWER_TIMEOUT {
            value
        } else {
            DEFAULT_ANSWER_TIMEOUT
        }
    }

    pub fn sanitize_marks_correct(value: f32) -> f32 {
        if value > 0.0 && value <= MAX_MARKS {
            value
        } else {
            DEFAULT_MARKS_CORRECT
        }
    }

    pub fn sanitize_marks_wrong(value: f32) -> f32 {
        if (0.0..=MAX_MARKS).contains(&value) {
            value
        } else {
            DEFAULT_MARKS_WRONG
        }
    }

    pub fn sanitize_question_count(value: i32) -> i32 {
        if value > 0 && value <= MAX_EXAM_QUESTIONS as i32 {
            value
        } else {
            MAX_EXAM_QUESTIONS as i32
        }
    }

    /// Replaces every out-of-range field with its fixed default.
    pub fn sanitized(&self) -> Self {
        Self {
            answer_timeout: Self::sanitize_timeout(self.answer_timeout),
            marks_correct: Self::sanitize_marks_correct(self.marks_correct),
            marks_wrong: Self::sanitize_marks_wrong(self.marks_wrong),
            question_count: Self::sanitize_question_count(self.question_count),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sanitized() == *self
    }
}

/// Student identity returned on a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    pub name: String,
    pub reg_no: String,
}

/// Outcome of one completed exam, sent client to server and stored in the result log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ExamResult {
    pub roll: String,
    pub name: String,
    /// Seconds spent on each presented question, at most [`MAX_EXAM_QUESTIONS`]
    pub response_times: Vec<u32>,
    pub total_time: u32,
    pub correct_answers: u32,
    pub attempted: u32,
    /// Placeholder on the wire; only the dashboard fills it in.
    pub rank: u32,
    pub flagged: bool,
}

impl ExamResult {
    pub fn accuracy(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.correct_answers as f64 / self.attempted as f64 * 100.0
        }
    }

    /// Roll and name end up in a `|`-delimited log line, so they must not carry delimiters.
    pub fn has_storable_fields(&self) -> bool {
        let clean = |s: &str| {
            !s.is_empty() && !s.contains(|c: char| c == '|' || c == ',' || c == '\n' || c == '\r')
        };
        clean(&self.roll) && clean(&self.name) && self.response_times.len() <= MAX_EXAM_QUESTIONS
    }
}
