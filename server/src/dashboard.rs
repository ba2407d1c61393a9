//! Ranked, flagged view over every recorded result
//!
//! Rebuilt from the result log each time it is shown; nothing here is
//! written back.

use crate::error::Result;
use crate::result_store::ResultStore;
use log::debug;
use shared::ExamResult;
use std::fmt::Write;

/// Any single answer faster than this many seconds marks the record suspicious.
pub const FAST_ANSWER_THRESHOLD: u32 = 2;

/// Forces the flag on for records containing an implausibly fast answer.
/// A flag the client already raised is never cleared.
pub fn flag_fast_answers(results: &mut [ExamResult]) -> usize {
    let mut newly_flagged = 0;
    for result in results.iter_mut() {
        if !result.flagged
            && result
                .response_times
                .iter()
                .any(|&t| t < FAST_ANSWER_THRESHOLD)
        {
            result.flagged = true;
            newly_flagged += 1;
        }
    }
    newly_flagged
}

/// Sorts by correct answers, highest first, and assigns 1-based ranks.
/// Ties keep their log order.
pub fn rank_results(results: &mut [ExamResult]) {
    // `sort_by` is stable
    results.sort_by(|a, b| b.correct_answers.cmp(&a.correct_answers));
    for (index, result) in results.iter_mut().enumerate() {
        result.rank = index as u32 + 1;
    }
}

/// Flag pass followed by rank pass
pub fn build_dashboard(mut results: Vec<ExamResult>) -> Vec<ExamResult> {
    let flagged = flag_fast_answers(&mut results);
    rank_results(&mut results);
    debug!(
        "Dashboard built over {} results, {} flagged by answer time",
        results.len(),
        flagged
    );
    results
}

/// Reloads the result log and returns it flagged and ranked.
///
/// Every call reads the file again, so results appended by sessions that
/// finished since the last view are included.
pub async fn load_dashboard(store: &ResultStore) -> Result<Vec<ExamResult>> {
    Ok(build_dashboard(store.reload_all().await?))
}

/// Text table for the instructor console
pub fn render_dashboard(results: &[ExamResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<24} {:>10} {:>9}  {}",
        "Rank", "Name", "Time (s)", "Accuracy", "Flag"
    );
    let _ = writeln!(out, "{}", "-".repeat(60));

    if results.is_empty() {
        let _ = writeln!(out, "No results recorded yet.");
        return out;
    }

    for result in results {
        let _ = writeln!(
            out,
            "{:<6} {:<24} {:>10} {:>8.1}%  {}",
            result.rank,
            result.name,
            result.total_time,
            result.accuracy(),
            if result.flagged { "SUSPICIOUS" } else { "" }
        );
    }
    out
}
