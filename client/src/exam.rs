//! Timed exam loop and scoring
//!
//! Every question gets its own deadline. An overall timer runs alongside and
//! raises a shared flag, checked before each new question is shown.

use crate::network::ExamPaper;
use log::{debug, info};
use shared::{
    difficulty_label, ExamConfig, ExamResult, Question, MAX_EXAM_QUESTIONS, MIN_ANSWER_TIME,
    OPTION_LETTERS,
};
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Overall exam duration when none is given on the command line
pub const OVERALL_EXAM_TIME: u64 = 300;

/// Background timer for the whole exam
pub struct ExamTimer {
    time_up: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ExamTimer {
    pub fn start(limit: Duration) -> Self {
        let time_up = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&time_up);

        let task = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            flag.store(true, Ordering::SeqCst);
            println!("\n*** Overall exam time is up! The exam will now end. ***");
        });

        Self { time_up, task }
    }

    pub fn is_time_up(&self) -> bool {
        self.time_up.load(Ordering::SeqCst)
    }
}

impl Drop for ExamTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// What the student typed for one question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Answer(char),
    Exit,
}

impl Response {
    pub fn parse(line: &str) -> Self {
        match line.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('E') => Response::Exit,
            Some(c) => Response::Answer(c),
            None => Response::Answer(' '),
        }
    }
}

/// Per-difficulty tally for the summary table
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TierStats {
    pub correct: u32,
    pub attempted: u32,
    pub time: u32,
}

impl TierStats {
    pub fn accuracy(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempted as f64 * 100.0
        }
    }

    pub fn average_time(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.time as f64 / self.attempted as f64
        }
    }
}

/// Running score for one exam
#[derive(Debug, Clone)]
pub struct Scorecard {
    config: ExamConfig,
    response_times: Vec<u32>,
    total_time: u32,
    correct: u32,
    wrong: u32,
    weighted_score: f64,
    fast_answer: bool,
    tiers: [TierStats; 3],
}

impl Scorecard {
    pub fn new(config: ExamConfig) -> Self {
        Self {
            config,
            response_times: Vec::with_capacity(MAX_EXAM_QUESTIONS),
            total_time: 0,
            correct: 0,
            wrong: 0,
            weighted_score: 0.0,
            fast_answer: false,
            tiers: [TierStats::default(); 3],
        }
    }

    /// Records an answer given after `seconds`. Returns true when correct.
    /// Letters outside A-D count as wrong.
    pub fn record_answer(&mut self, question: &Question, answer: char, seconds: u32) -> bool {
        self.push_time(question, seconds);

        if !OPTION_LETTERS.contains(&answer) {
            self.wrong += 1;
            return false;
        }
        if seconds < MIN_ANSWER_TIME {
            self.fast_answer = true;
        }

        if answer == question.correct {
            self.correct += 1;
            self.weighted_score += question.weight();
            if let Some(tier) = self.tier_mut(question.difficulty) {
                tier.correct += 1;
            }
            true
        } else {
            self.wrong += 1;
            false
        }
    }

    /// No answer before the deadline: wrong, timed at the full deadline.
    pub fn record_timeout(&mut self, question: &Question) {
        self.push_time(question, self.config.answer_timeout.max(0) as u32);
        self.wrong += 1;
    }

    /// A received question that failed validation is skipped but still
    /// counts as attempted and wrong.
    pub fn record_invalid_question(&mut self) {
        self.wrong += 1;
    }

    /// Time spent on the question the student left the exam from. It counts
    /// toward the total but not as an attempt.
    pub fn record_exit(&mut self, seconds: u32) {
        self.total_time += seconds;
    }

    fn push_time(&mut self, question: &Question, seconds: u32) {
        if self.response_times.len() < MAX_EXAM_QUESTIONS {
            self.response_times.push(seconds);
        }
        self.total_time += seconds;
        if let Some(tier) = self.tier_mut(question.difficulty) {
            tier.attempted += 1;
            tier.time += seconds;
        }
    }

    fn tier_mut(&mut self, difficulty: u8) -> Option<&mut TierStats> {
        self.tiers.get_mut((difficulty as usize).checked_sub(1)?)
    }

    pub fn tier(&self, difficulty: u8) -> Option<&TierStats> {
        self.tiers.get((difficulty as usize).checked_sub(1)?)
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

    pub fn attempted(&self) -> u32 {
        self.correct + self.wrong
    }

    pub fn total_time(&self) -> u32 {
        self.total_time
    }

    pub fn weighted_score(&self) -> f64 {
        self.weighted_score
    }

    /// Marks under the instructor's scheme
    pub fn net_marks(&self) -> f64 {
        self.correct as f64 * self.config.marks_correct as f64
            - self.wrong as f64 * self.config.marks_wrong as f64
    }

    pub fn accuracy(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            0.0
        } else {
            self.correct as f64 / attempted as f64 * 100.0
        }
    }

    /// Any single fast answer, or an average under the threshold
    pub fn is_flagged(&self) -> bool {
        let attempted = self.attempted();
        self.fast_answer || (attempted > 0 && self.total_time / attempted < MIN_ANSWER_TIME)
    }

    pub fn into_result(self, roll: &str, name: &str) -> ExamResult {
        ExamResult {
            roll: roll.to_string(),
            name: name.to_string(),
            flagged: self.is_flagged(),
            total_time: self.total_time,
            correct_answers: self.correct,
            attempted: self.attempted(),
            rank: 0,
            response_times: self.response_times,
        }
    }
}

/// Presents each question in turn and scores the answers read from `answers`.
///
/// Stops early when the overall timer fires, the student types `e`, or the
/// input closes.
pub async fn conduct_exam(
    paper: &ExamPaper,
    answers: &mut mpsc::UnboundedReceiver<String>,
    timer: &ExamTimer,
) -> Scorecard {
    let config = paper.config;
    let deadline = Duration::from_secs(config.answer_timeout.max(0) as u64);
    let mut card = Scorecard::new(config);

    println!(
        "\nExam starting now. You will be shown {} questions, {} seconds each.",
        paper.questions.len(),
        config.answer_timeout
    );
    println!("Question weights: Easy x1.0, Medium x1.5, Hard x2.0");
    println!("Enter 'e' at any time to exit the exam.");

    for (index, question) in paper.questions.iter().enumerate() {
        if timer.is_time_up() {
            println!("\nOverall exam time has expired.");
            break;
        }

        if !question.is_valid() {
            println!("\nInvalid question {}, skipping", index + 1);
            card.record_invalid_question();
            continue;
        }

        print_question(index, question);

        // Lines typed after the previous deadline belong to no question
        while answers.try_recv().is_ok() {}

        let asked = Instant::now();
        let response = tokio::time::timeout(deadline, answers.recv()).await;
        let seconds = asked.elapsed().as_secs() as u32;

        match response {
            Err(_) => {
                println!("\nTime's up for this question! No answer provided.");
                card.record_timeout(question);
            }
            Ok(None) => {
                info!("Answer input closed, ending exam");
                break;
            }
            Ok(Some(line)) => match Response::parse(&line) {
                Response::Exit => {
                    card.record_exit(seconds);
                    println!("\nExiting exam early...");
                    break;
                }
                Response::Answer(answer) => {
                    if seconds < MIN_ANSWER_TIME && OPTION_LETTERS.contains(&answer) {
                        println!("Warning: you answered very quickly ({} seconds).", seconds);
                    }
                    if !OPTION_LETTERS.contains(&answer) {
                        println!("Invalid answer! Treated as wrong.");
                        card.record_answer(question, answer, seconds);
                    } else if card.record_answer(question, answer, seconds) {
                        println!("Correct! (+{:.1} points)", question.weight());
                    } else {
                        println!("Wrong! Correct answer: {}", question.correct);
                    }
                }
            },
        }
        debug!("Question {} took {}s", index + 1, seconds);
    }

    card
}

fn print_question(index: usize, question: &Question) {
    println!("\n--------------------------------------------------");
    println!("Q{} [{}]", index + 1, difficulty_label(question.difficulty));
    println!("{}", question.text);
    for (letter, option) in OPTION_LETTERS.iter().zip(question.options.iter()) {
        println!("  {}) {}", letter, option);
    }
    println!("--------------------------------------------------");
    println!("Your answer (A/B/C/D or 'e' to exit): ");
}

/// Score summary with a per-difficulty breakdown
pub fn render_summary(card: &Scorecard, question_count: usize) -> String {
    let mut out = String::new();
    let max_score = question_count as f64 * 2.0;

    let _ = writeln!(out, "\n==================== RESULTS ====================");
    let _ = writeln!(out, "Weighted score : {:.2} (max {:.1})", card.weighted_score(), max_score);
    let _ = writeln!(out, "Marks          : {:.2}", card.net_marks());
    let _ = writeln!(out, "Accuracy       : {:.2}%", card.accuracy());
    let _ = writeln!(out, "Time spent     : {}s", card.total_time());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<8} {:>8} {:>10} {:>9} {:>9}",
        "Level", "Correct", "Attempted", "Accuracy", "Avg Time"
    );

    for difficulty in 1..=3u8 {
        if let Some(tier) = card.tier(difficulty).filter(|t| t.attempted > 0) {
            let _ = writeln!(
                out,
                "{:<8} {:>8} {:>10} {:>8.1}% {:>8.1}s",
                difficulty_label(difficulty),
                tier.correct,
                tier.attempted,
                tier.accuracy(),
                tier.average_time()
            );
        }
    }

    let _ = writeln!(out, "Total attempted: {}", card.attempted());
    if card.is_flagged() {
        let _ = writeln!(out, "Note: unusually fast answers were detected.");
    }
    out
}
