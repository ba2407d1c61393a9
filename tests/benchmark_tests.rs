//! Throughput and stress checks for the exam server's hot paths

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::dashboard::build_dashboard;
use server::question_store::QuestionStore;
use server::result_store::ResultStore;
use shared::{ExamResult, Question};
use std::sync::Arc;
use std::time::Instant;

fn temp_log(name: &str) -> ResultStore {
    let path = std::env::temp_dir().join(format!(
        "examsys-bench-{}-{}.txt",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    ResultStore::new(path)
}

fn result(index: u32) -> ExamResult {
    ExamResult {
        roll: format!("21CS{:06}", index),
        name: format!("Student{}", index),
        response_times: vec![6 + index % 7, 9, 12, 7, 8],
        total_time: 42 + index % 7,
        correct_answers: index % 6,
        attempted: 5,
        rank: 0,
        flagged: index % 11 == 0,
    }
}

/// Many sessions appending at once must leave one intact line each
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn stress_concurrent_appends() {
    let store = Arc::new(temp_log("appends"));
    let writers = 200;

    let start = Instant::now();
    let mut handles = Vec::new();
    for index in 0..writers {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.append(&result(index)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let duration = start.elapsed();
    println!("Concurrent appends: {} writers in {:?}", writers, duration);

    let text = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(text.lines().count(), writers as usize);
    assert!(text.lines().all(|line| line.split('|').count() == 7 && line.ends_with(',')));

    let mut rolls: Vec<String> = store
        .reload_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.roll)
        .collect();
    rolls.sort();
    rolls.dedup();
    assert_eq!(rolls.len(), writers as usize);

    assert!(duration.as_secs() < 10);
}

/// Reload plus flag and rank passes over a large log
#[tokio::test]
async fn benchmark_dashboard_rebuild() {
    let store = temp_log("dashboard");
    for index in 0..2_000 {
        store.append(&result(index)).await.unwrap();
    }

    let start = Instant::now();
    let iterations = 20;
    let mut ranked = Vec::new();
    for _ in 0..iterations {
        ranked = build_dashboard(store.reload_all().await.unwrap());
    }
    let duration = start.elapsed();
    println!(
        "Dashboard rebuild: {} iterations over {} results in {:?}",
        iterations,
        ranked.len(),
        duration
    );

    assert_eq!(ranked.len(), 2_000);
    assert!(ranked
        .windows(2)
        .all(|pair| pair[0].correct_answers >= pair[1].correct_answers));
    let ranks: Vec<u32> = ranked.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=2_000).collect::<Vec<u32>>());
    assert!(duration.as_secs() < 10);
}

/// Stable ranking keeps file order among equal scores at scale
#[test]
fn benchmark_ranking_stability() {
    let results: Vec<ExamResult> = (0..50_000).map(result).collect();

    let start = Instant::now();
    let ranked = build_dashboard(results);
    let duration = start.elapsed();
    println!("Ranking 50k results took {:?}", duration);

    for pair in ranked.windows(2) {
        if pair[0].correct_answers == pair[1].correct_answers {
            assert!(pair[0].roll < pair[1].roll);
        }
    }
    assert!(duration.as_millis() < 2_000);
}

/// Per-student selection from a full bank
#[test]
fn benchmark_question_selection() {
    let bank: Vec<Question> = (0..200)
        .map(|i| {
            let difficulty = (i % 3 + 1) as u8;
            Question::new(&format!("Question {}", i), ["a", "b", "c", "d"], 'A', difficulty)
        })
        .collect();
    let store = QuestionStore::new(bank);
    let mut rng = StdRng::seed_from_u64(42);

    let iterations = 20_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let selected = store.select(5, &mut rng);
        assert_eq!(selected.len(), 5);
    }
    let duration = start.elapsed();
    println!(
        "Question selection: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_secs() < 5);
}
