//! In-memory question bank and per-student question selection.
//!
//! The bank file holds one question per block of seven non-blank lines:
//! question text, options A to D, correct letter and difficulty (1-3).

use crate::error::{Result, ServerError};
use log::{info, warn};
use rand::Rng;
use shared::{Question, MAX_EXAM_QUESTIONS};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Upper bound on questions kept in memory
pub const MAX_QUESTIONS: usize = 200;

const LINES_PER_QUESTION: usize = 7;

/// Ordered, read-only set of questions loaded at startup
#[derive(Debug, Clone)]
pub struct QuestionStore {
    questions: Vec<Question>,
}

impl QuestionStore {
    /// Builds a store from the given records, padded with the canonical
    /// default up to a full exam.
    pub fn new(mut questions: Vec<Question>) -> Self {
        questions.truncate(MAX_QUESTIONS);
        while questions.len() < MAX_EXAM_QUESTIONS {
            questions.push(Question::canonical_default());
        }
        Self { questions }
    }

    /// Loads the bank file, creating it with the default question if missing.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Question file {} not found, creating with default question", path.display());
                let text = format_question(&Question::canonical_default());
                std::fs::write(path, &text)?;
                text
            }
            Err(e) => return Err(e.into()),
        };

        let questions = parse_questions(&text);
        info!("Loaded {} questions from {}", questions.len(), path.display());
        if questions.len() < MAX_EXAM_QUESTIONS {
            warn!(
                "Only {} questions available, padding with default questions up to {}",
                questions.len(),
                MAX_EXAM_QUESTIONS
            );
        }

        Ok(Self::new(questions))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[cfg(test)]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Picks `count` questions in a fresh random order for one student.
    ///
    /// Each record is validated again on the way out and replaced by the
    /// canonical default if it no longer passes.
    pub fn select<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Question> {
        let mut indices = shuffled_indices(self.questions.len(), rng);
        indices.truncate(count);

        indices
            .into_iter()
            .map(|index| {
                let question = &self.questions[index];
                if !question.is_valid() {
                    warn!("Question {} failed validation, delivering default", index + 1);
                }
                question.or_default()
            })
            .collect()
    }
}

/// Fisher-Yates permutation of `0..len`, walking from the highest index down
/// and swapping each slot with a uniformly chosen slot at or below it.
pub fn shuffled_indices<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
    indices
}

/// Parses seven-line question blocks, skipping blocks that fail validation.
pub fn parse_questions(text: &str) -> Vec<Question> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut questions = Vec::new();
    for (block_index, block) in lines.chunks(LINES_PER_QUESTION).enumerate() {
        if questions.len() >= MAX_QUESTIONS {
            warn!("Question limit of {} reached, ignoring the rest", MAX_QUESTIONS);
            break;
        }
        if block.len() < LINES_PER_QUESTION {
            warn!("Incomplete question block {} at end of file", block_index + 1);
            break;
        }

        let question = Question {
            text: block[0].to_string(),
            options: [
                block[1].to_string(),
                block[2].to_string(),
                block[3].to_string(),
                block[4].to_string(),
            ],
            correct: block[5]
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or(' '),
            difficulty: block[6].parse().unwrap_or(0),
        };

        if !question.is_valid() {
            warn!("Skipping invalid question block {}: {}", block_index + 1, question.text);
            continue;
        }
        questions.push(question);
    }
    questions
}

pub fn format_question(question: &Question) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
        question.text,
        question.options[0],
        question.options[1],
        question.options[2],
        question.options[3],
        question.correct,
        question.difficulty
    )
}

/// Appends a validated question to the bank file. The in-memory store only
/// sees it after an explicit reload.
pub fn append_question(path: &Path, question: &Question) -> Result<()> {
    let single_line = |s: &str| !s.contains('\n');
    if !question.is_valid()
        || !single_line(&question.text)
        || !question.options.iter().all(|o| single_line(o))
    {
        return Err(ServerError::InvalidQuestion(question.text.clone()));
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format_question(question).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn sample_questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| {
                Question::new(
                    &format!("Question {}", i),
                    ["a", "b", "c", "d"],
                    'A',
                    (i % 3 + 1) as u8,
                )
            })
            .collect()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("examsys-{}-{}.txt", name, std::process::id()))
    }

    #[test]
    fn test_parse_questions() {
        let text = concat!(
            "What is 2+2?\n3\n4\n\n5\n6\nb\n1\n",
            "  Largest ocean?\nAtlantic\nPacific\nIndian\nArctic\nB\n2\n",
        );
        let questions = parse_questions(text);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct, 'B');
        assert_eq!(questions[0].options[2], "5");
        assert_eq!(questions[1].text, "Largest ocean?");
        assert_eq!(questions[1].difficulty, 2);
    }

    #[test]
    fn test_parse_skips_invalid_blocks() {
        let text = "Bad difficulty\na\nb\nc\nd\nA\n7\nGood\na\nb\nc\nd\nD\n3\n";
        let questions = parse_questions(text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "Good");
    }

    #[test]
    fn test_parse_ignores_incomplete_tail() {
        let text = "Good\na\nb\nc\nd\nC\n1\nHalf\na\nb\n";
        assert_eq!(parse_questions(text).len(), 1);
    }

    #[test]
    fn test_store_padded_with_defaults() {
        let store = QuestionStore::new(sample_questions(2));
        assert_eq!(store.len(), MAX_EXAM_QUESTIONS);
        assert_eq!(store.get(4), Some(&Question::canonical_default()));
    }

    #[test]
    fn test_shuffled_indices_is_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0, 1, 2, 10, 50] {
            let mut indices = shuffled_indices(len, &mut rng);
            indices.sort_unstable();
            assert_eq!(indices, (0..len).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_shuffle_reaches_every_position() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut first_seen = HashSet::new();
        for _ in 0..500 {
            first_seen.insert(shuffled_indices(6, &mut rng)[0]);
        }
        assert_eq!(first_seen.len(), 6);
    }

    #[test]
    fn test_select_returns_exact_count() {
        let store = QuestionStore::new(sample_questions(20));
        let mut rng = StdRng::seed_from_u64(1);

        for count in 0..=MAX_EXAM_QUESTIONS {
            let selected = store.select(count, &mut rng);
            assert_eq!(selected.len(), count);

            let distinct: HashSet<&str> = selected.iter().map(|q| q.text.as_str()).collect();
            assert_eq!(distinct.len(), count);
        }
    }

    #[test]
    fn test_select_never_delivers_invalid_record() {
        let mut questions = sample_questions(5);
        questions[0].correct = 'X';
        questions[3].text.clear();
        let store = QuestionStore::new(questions);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let selected = store.select(5, &mut rng);
            assert_eq!(selected.len(), 5);
            assert!(selected.iter().all(Question::is_valid));
            let defaults = selected
                .iter()
                .filter(|q| **q == Question::canonical_default())
                .count();
            assert_eq!(defaults, 2);
        }
    }

    #[test]
    fn test_select_caps_at_available() {
        let store = QuestionStore::new(sample_questions(5));
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(store.select(50, &mut rng).len(), 5);
    }

    #[test]
    fn test_append_then_reload() {
        let path = temp_path("bank");
        let _ = std::fs::remove_file(&path);

        let question =
            Question::new("Boiling point of water?", ["90", "100", "110", "120"], 'B', 1);
        append_question(&path, &question).unwrap();

        let store = QuestionStore::load(&path).unwrap();
        assert_eq!(store.get(0), Some(&question));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_append_rejects_invalid_question() {
        let path = temp_path("bank-invalid");
        let question = Question::new("", ["a", "b", "c", "d"], 'A', 1);
        assert!(matches!(
            append_question(&path, &question),
            Err(ServerError::InvalidQuestion(_))
        ));
    }

    #[test]
    fn test_missing_bank_created_with_default() {
        let path = temp_path("bank-missing");
        let _ = std::fs::remove_file(&path);

        let store = QuestionStore::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.len(), MAX_EXAM_QUESTIONS);
        assert_eq!(store.get(0), Some(&Question::canonical_default()));

        let _ = std::fs::remove_file(&path);
    }
}
