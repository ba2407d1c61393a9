//! Persistence of the exam configuration in the rules file.

use crate::error::Result;
use log::{info, warn};
use shared::ExamConfig;
use std::io::ErrorKind;
use std::path::Path;

const TIME_LIMIT: &str = "Time limit per question:";
const MARKS_CORRECT: &str = "Marks awarded for correct answer:";
const MARKS_WRONG: &str = "Marks deducted for incorrect answer:";
const QUESTION_COUNT: &str = "Questions per exam:";

/// Reads the rules file, creating it with defaults when it does not exist.
pub fn load_rules(path: &Path) -> Result<ExamConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let config = parse_rules(&text);
            info!(
                "Loaded rules: timeout={}s, correct={:.2}, wrong={:.2}, questions={}",
                config.answer_timeout,
                config.marks_correct,
                config.marks_wrong,
                config.question_count
            );
            Ok(config)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Rules file {} not found, creating with defaults", path.display());
            let config = ExamConfig::default();
            save_rules(path, &config)?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

/// Parses labelled rule lines. Unparseable or out-of-range values fall back to defaults.
pub fn parse_rules(text: &str) -> ExamConfig {
    let defaults = ExamConfig::default();

    let answer_timeout = match field::<i32>(text, TIME_LIMIT) {
        Some(v) if ExamConfig::sanitize_timeout(v) == v => v,
        _ => {
            warn!("Invalid time limit in rules file, using default {}", defaults.answer_timeout);
            defaults.answer_timeout
        }
    };

    let marks_correct = match field::<f32>(text, MARKS_CORRECT) {
        Some(v) if ExamConfig::sanitize_marks_correct(v) == v => v,
        _ => {
            warn!(
                "Invalid correct-answer marks in rules file, using default {}",
                defaults.marks_correct
            );
            defaults.marks_correct
        }
    };

    let marks_wrong = match field::<f32>(text, MARKS_WRONG) {
        Some(v) if ExamConfig::sanitize_marks_wrong(v) == v => v,
        _ => {
            warn!(
                "Invalid wrong-answer marks in rules file, using default {}",
                defaults.marks_wrong
            );
            defaults.marks_wrong
        }
    };

    // Older rules files carry only the first three lines.
    let question_count = field::<i32>(text, QUESTION_COUNT)
        .map(ExamConfig::sanitize_question_count)
        .unwrap_or(defaults.question_count);

    ExamConfig {
        answer_timeout,
        marks_correct,
        marks_wrong,
        question_count,
    }
}

/// Rounds marks to the two decimals the rules file keeps, so a value served
/// before a restart matches the one read back after it.
pub fn round_marks(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

pub fn format_rules(config: &ExamConfig) -> String {
    format!(
        "{} {}\n{} {:.2}\n{} {:.2}\n{} {}\n",
        TIME_LIMIT,
        config.answer_timeout,
        MARKS_CORRECT,
        config.marks_correct,
        MARKS_WRONG,
        config.marks_wrong,
        QUESTION_COUNT,
        config.question_count
    )
}

/// Overwrites the rules file with `config`.
pub fn save_rules(path: &Path, config: &ExamConfig) -> Result<()> {
    std::fs::write(path, format_rules(config))?;
    Ok(())
}

fn field<T: std::str::FromStr>(text: &str, label: &str) -> Option<T> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_parse_rules() {
        let text = "Time limit per question: 45\n\
                    Marks awarded for correct answer: 2.00\n\
                    Marks deducted for incorrect answer: 0.50\n\
                    Questions per exam: 3\n";
        let config = parse_rules(text);
        assert_eq!(config.answer_timeout, 45);
        assert_approx_eq!(config.marks_correct, 2.0);
        assert_approx_eq!(config.marks_wrong, 0.5);
        assert_eq!(config.question_count, 3);
    }

    #[test]
    fn test_invalid_lines_fall_back_to_defaults() {
        let text = "Time limit per question: 9999\n\
                    Marks awarded for correct answer: abc\n\
                    Marks deducted for incorrect answer: -3\n";
        assert_eq!(parse_rules(text), ExamConfig::default());
    }

    #[test]
    fn test_three_line_file_keeps_default_question_count() {
        let text = "Time limit per question: 20\n\
                    Marks awarded for correct answer: 1.00\n\
                    Marks deducted for incorrect answer: 0.25\n";
        let config = parse_rules(text);
        assert_eq!(config.answer_timeout, 20);
        assert_eq!(config.question_count, shared::MAX_EXAM_QUESTIONS as i32);
    }

    #[test]
    fn test_format_parse_agree() {
        let config = ExamConfig {
            answer_timeout: 60,
            marks_correct: 4.0,
            marks_wrong: 1.0,
            question_count: 2,
        };
        assert_eq!(parse_rules(&format_rules(&config)), config);
    }

    #[test]
    fn test_missing_file_created_with_defaults() {
        let path = std::env::temp_dir().join(format!("examsys-rules-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let config = load_rules(&path).unwrap();
        assert_eq!(config, ExamConfig::default());
        assert!(path.exists());

        let _ = std::fs::remove_file(&path);
    }
}
