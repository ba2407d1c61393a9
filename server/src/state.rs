//! Exam state shared by the accept loop, every session and the instructor
//! command loop

use crate::barrier::StartBarrier;
use crate::dashboard;
use crate::directory::CredentialStore;
use crate::error::{Result, ServerError};
use crate::question_store::{self, QuestionStore};
use crate::registry::ClientRegistry;
use crate::result_store::ResultStore;
use crate::rules;
use log::{info, warn};
use rand::Rng;
use shared::{ExamConfig, ExamResult, Question};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Files backing the exam
#[derive(Debug, Clone)]
pub struct ExamFiles {
    pub questions: PathBuf,
    pub results: PathBuf,
    pub rules: PathBuf,
}

/// Everything the server knows about the running exam.
///
/// One instance is shared behind an `Arc` by the accept loop, every student
/// session and the instructor command loop. The registry and the start
/// barrier are public because sessions drive them directly; the rules and
/// question bank only change through the methods below, which keep the
/// files on disk in step with memory.
pub struct ExamState {
    pub registry: Mutex<ClientRegistry>,
    pub barrier: StartBarrier,
    pub results: ResultStore,
    credentials: Arc<dyn CredentialStore>,
    questions: RwLock<QuestionStore>,
    config: RwLock<ExamConfig>,
    files: ExamFiles,
    next_session_id: AtomicU32,
}

impl ExamState {
    /// Loads the rules and question bank, creating either file if missing.
    pub fn load(credentials: Arc<dyn CredentialStore>, files: ExamFiles) -> Result<Self> {
        let config = rules::load_rules(&files.rules)?;
        let questions = QuestionStore::load(&files.questions)?;

        Ok(Self {
            registry: Mutex::new(ClientRegistry::default()),
            barrier: StartBarrier::new(),
            results: ResultStore::new(files.results.clone()),
            credentials,
            questions: RwLock::new(questions),
            config: RwLock::new(config),
            files,
            next_session_id: AtomicU32::new(1),
        })
    }

    /// Student and instructor records used for login checks.
    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    pub fn files(&self) -> &ExamFiles {
        &self.files
    }

    /// Connection identity for a freshly accepted socket
    pub fn allocate_session_id(&self) -> u32 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Current configuration as stored, before per-delivery validation.
    pub async fn config(&self) -> ExamConfig {
        *self.config.read().await
    }

    /// Configuration and questions for one student, both validated again.
    ///
    /// The delivered count never exceeds the number of questions in the bank.
    pub async fn prepare_exam<R: Rng + ?Sized>(&self, rng: &mut R) -> (ExamConfig, Vec<Question>) {
        let stored = self.config().await;
        let mut config = stored.sanitized();
        if config != stored {
            warn!("Exam configuration out of range, delivering defaults for invalid fields");
        }

        let questions = self.questions.read().await;
        let count = (config.question_count.max(0) as usize).min(questions.len());
        config.question_count = count as i32;
        (config, questions.select(count, rng))
    }

    /// Releases every registered student and logs the roster being released.
    ///
    /// With nobody registered this is a no-op; the caller reports it to the
    /// operator.
    pub async fn start_exam(&self) -> Result<usize> {
        let registry = self.registry.lock().await;
        if registry.is_empty() {
            return Err(ServerError::NoStudentsRegistered);
        }

        self.barrier.trigger_start()?;
        let roster = registry.snapshot();
        for client in &roster {
            info!(
                "Releasing {} (session {}, {}) after waiting {:.1}s",
                client.roll,
                client.session_id,
                client.addr,
                client.registered_at.elapsed().as_secs_f32()
            );
        }
        info!("Exam started for {} students", roster.len());
        Ok(roster.len())
    }

    /// Sets the per-question time limit and writes it to the rules file.
    ///
    /// Out-of-range values fall back to the default. Sessions that already
    /// received their configuration keep the old limit.
    pub async fn set_time_limit(&self, seconds: i32) -> Result<ExamConfig> {
        let clamped = ExamConfig::sanitize_timeout(seconds);
        if clamped != seconds {
            warn!("Time limit {}s out of range, using {}s", seconds, clamped);
        }

        let updated = {
            let mut config = self.config.write().await;
            config.answer_timeout = clamped;
            *config
        };
        self.persist_rules(updated).await?;
        info!("Time limit per question set to {}s", clamped);
        Ok(updated)
    }

    /// Sets marks per correct and per wrong answer, rounded to two decimals
    /// and clamped to range, then writes them to the rules file.
    pub async fn set_marking_scheme(&self, correct: f32, wrong: f32) -> Result<ExamConfig> {
        let marks_correct = ExamConfig::sanitize_marks_correct(rules::round_marks(correct));
        let marks_wrong = ExamConfig::sanitize_marks_wrong(rules::round_marks(wrong));
        if marks_correct != correct || marks_wrong != wrong {
            warn!(
                "Marking scheme {}/{} adjusted to {:.2}/{:.2}",
                correct, wrong, marks_correct, marks_wrong
            );
        }

        let updated = {
            let mut config = self.config.write().await;
            config.marks_correct = marks_correct;
            config.marks_wrong = marks_wrong;
            *config
        };
        self.persist_rules(updated).await?;
        info!("Marking scheme set to +{:.2} / -{:.2}", marks_correct, marks_wrong);
        Ok(updated)
    }

    async fn persist_rules(&self, config: ExamConfig) -> Result<()> {
        let path = self.files.rules.clone();
        tokio::task::spawn_blocking(move || rules::save_rules(&path, &config)).await?
    }

    /// Appends to the bank file, then reloads the in-memory store from it.
    ///
    /// Students already holding a paper are unaffected; the new question is
    /// only eligible for papers prepared afterwards.
    pub async fn add_question(&self, question: &Question) -> Result<usize> {
        let path = self.files.questions.clone();
        let question = question.clone();
        let reloaded = tokio::task::spawn_blocking(move || {
            question_store::append_question(&path, &question)?;
            QuestionStore::load(&path)
        })
        .await??;

        let len = reloaded.len();
        *self.questions.write().await = reloaded;
        Ok(len)
    }

    /// Reloads every stored result and ranks it for display.
    pub async fn dashboard(&self) -> Result<Vec<ExamResult>> {
        dashboard::load_dashboard(&self.results).await
    }
}
