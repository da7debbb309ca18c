//! Turn bookkeeping shared by every mode: scope, counters, used-word set,
//! bounded performance history and the mutable pacing strategy.
//!
//! A `SessionCore` only exists between initialize and reset. Modes keep it in
//! an `Option` so "uninitialized" is unrepresentable inside the core itself.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, ProgressMap, QuizMode, Word};
use crate::error::{EngineError, EngineResult};
use crate::mastery::check_progress_integrity;

/// What an incorrect answer does to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
  NeverFails,
  FailsOnFirstError,
  /// Terminal on the first error, with the mode re-planning every turn from
  /// its error-risk estimate.
  RiskAdaptive,
}

impl FailurePolicy {
  pub fn fails_on_error(self) -> bool {
    matches!(self, Self::FailsOnFirstError | Self::RiskAdaptive)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CognitiveLoad {
  Low,
  Medium,
  High,
}

/// Pacing and format preferences, revised turn by turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
  pub seconds_per_word: f64,
  pub preferred_quiz_mode: QuizMode,
  pub cognitive_load: CognitiveLoad,
}

impl Default for Strategy {
  fn default() -> Self {
    Self { seconds_per_word: 15.0, preferred_quiz_mode: QuizMode::MultipleChoice, cognitive_load: CognitiveLoad::Medium }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
  pub word_id: String,
  pub correct: bool,
  pub time_spent_ms: u64,
  pub quiz_mode: QuizMode,
  pub difficulty: f64,
}

/// The word most recently handed out, used to annotate its completion.
#[derive(Clone, Debug)]
struct PendingTurn {
  word_id: String,
  quiz_mode: QuizMode,
  difficulty: f64,
}

#[derive(Debug)]
pub struct SessionCore {
  pub mode: ChallengeMode,
  pub session_id: Uuid,
  pub started_at: DateTime<Utc>,
  pub language: String,
  pub module_id: Option<String>,
  pub target_words: usize,
  pub time_limit_secs: Option<u32>,
  pub difficulty_seed: Option<f64>,
  pub words: Vec<Word>,
  pub progress: ProgressMap,
  pub used_word_ids: HashSet<String>,
  pub history: VecDeque<TurnRecord>,
  pub words_completed: usize,
  pub correct_total: u32,
  pub incorrect_total: u32,
  pub consecutive_correct: u32,
  pub consecutive_incorrect: u32,
  pub strategy: Strategy,
  pub ai_available: bool,
  /// Progress entries whose direction breakdown disagreed with the aggregates.
  pub integrity_mismatches: usize,
  failed: bool,
  policy: FailurePolicy,
  history_len: usize,
  pending: Option<PendingTurn>,
}

fn count_mismatches(progress: &ProgressMap) -> usize {
  progress.iter().filter(|(id, p)| !check_progress_integrity(id, p)).count()
}

impl SessionCore {
  pub fn new(
    mode: ChallengeMode,
    policy: FailurePolicy,
    config: ChallengeConfig,
    ai_available: bool,
    history_len: usize,
  ) -> EngineResult<Self> {
    if config.target_words == 0 {
      return Err(EngineError::InvalidConfig("targetWords must be at least 1".into()));
    }
    if config.language.trim().is_empty() {
      return Err(EngineError::InvalidConfig("language is required".into()));
    }
    let integrity_mismatches = count_mismatches(&config.progress);

    let core = Self {
      mode,
      session_id: Uuid::new_v4(),
      started_at: Utc::now(),
      language: config.language,
      module_id: config.module_id,
      target_words: config.target_words,
      time_limit_secs: config.time_limit_secs,
      difficulty_seed: config.difficulty_seed,
      words: config.words,
      progress: config.progress,
      used_word_ids: HashSet::new(),
      history: VecDeque::with_capacity(history_len),
      words_completed: 0,
      correct_total: 0,
      incorrect_total: 0,
      consecutive_correct: 0,
      consecutive_incorrect: 0,
      strategy: Strategy::default(),
      ai_available,
      integrity_mismatches,
      failed: false,
      policy,
      history_len,
      pending: None,
    };
    info!(
      target: "challenge",
      mode = %mode,
      session = %core.session_id,
      language = %core.language,
      module = ?core.module_id,
      pool = core.words.len(),
      target = core.target_words,
      ai_available,
      "Session initialized"
    );
    Ok(core)
  }

  pub fn same_scope(&self, config: &ChallengeConfig) -> bool {
    self.language == config.language && self.module_id == config.module_id
  }

  pub fn is_failed(&self) -> bool {
    self.failed
  }

  pub fn policy(&self) -> FailurePolicy {
    self.policy
  }

  /// Take the caller's latest progress snapshot; the engine never fetches it itself.
  pub fn refresh(&mut self, ctx: &ChallengeContext) {
    if ctx.progress.is_empty() {
      return;
    }
    let mismatches = count_mismatches(&ctx.progress);
    if mismatches > 0 {
      warn!(
        target: "challenge",
        mode = %self.mode,
        session = %self.session_id,
        words_completed = ctx.words_completed,
        mismatches,
        "Turn progress snapshot has inconsistent counters"
      );
      self.integrity_mismatches += mismatches;
    }
    self.progress = ctx.progress.clone();
  }

  pub fn no_words(&self) -> EngineError {
    EngineError::NoWordsAvailable { language: self.language.clone(), module: self.module_id.clone() }
  }

  pub fn ensure_pool(&self) -> EngineResult<()> {
    if self.words.is_empty() {
      return Err(self.no_words());
    }
    Ok(())
  }

  /// Effective target: the per-turn context wins when it carries one.
  pub fn target_for(&self, ctx: &ChallengeContext) -> usize {
    if ctx.target_words > 0 {
      ctx.target_words
    } else {
      self.target_words
    }
  }

  /// Record a word as handed out. Ids outside the pool are never tracked, so
  /// the used set stays bounded by the pool size.
  pub fn present(&mut self, word_id: &str, quiz_mode: QuizMode, difficulty: f64) {
    if self.words.iter().any(|w| w.id == word_id) {
      self.used_word_ids.insert(word_id.to_string());
    }
    self.pending = Some(PendingTurn { word_id: word_id.to_string(), quiz_mode, difficulty });
  }

  /// Ids the advisor may choose from: unused words, pool order, capped.
  pub fn candidate_ids(&self, limit: usize) -> Vec<String> {
    self
      .words
      .iter()
      .filter(|w| !self.used_word_ids.contains(&w.id))
      .take(limit)
      .map(|w| w.id.clone())
      .collect()
  }

  pub fn recent_accuracy(&self) -> Option<f64> {
    if self.history.is_empty() {
      return None;
    }
    let correct = self.history.iter().filter(|t| t.correct).count();
    Some(correct as f64 / self.history.len() as f64)
  }

  /// Answers in the history that took noticeably longer than the pacing target.
  pub fn hesitations(&self) -> u32 {
    let limit_ms = self.strategy.seconds_per_word * 1500.0;
    self.history.iter().filter(|t| t.time_spent_ms as f64 > limit_ms).count() as u32
  }

  /// Apply a completion to counters and history, then the failure policy.
  pub fn record(&mut self, word_id: &str, correct: bool, time_spent_ms: u64, metadata: Option<&Metadata>) -> CompletionResult {
    if self.failed {
      return CompletionResult::failed();
    }

    let pending = self.pending.take().filter(|p| p.word_id == word_id);
    let hinted_mode = metadata
      .and_then(|m| m.get("quizMode"))
      .and_then(|v| v.as_str())
      .and_then(QuizMode::parse);
    let quiz_mode = hinted_mode
      .or(pending.as_ref().map(|p| p.quiz_mode))
      .unwrap_or(self.strategy.preferred_quiz_mode);
    let difficulty = pending.as_ref().map(|p| p.difficulty).unwrap_or(50.0);

    if self.history.len() == self.history_len {
      self.history.pop_front();
    }
    self.history.push_back(TurnRecord { word_id: word_id.to_string(), correct, time_spent_ms, quiz_mode, difficulty });

    self.words_completed += 1;
    if correct {
      self.correct_total += 1;
      self.consecutive_correct += 1;
      self.consecutive_incorrect = 0;
    } else {
      self.incorrect_total += 1;
      self.consecutive_incorrect += 1;
      self.consecutive_correct = 0;
    }

    debug!(
      target: "challenge",
      mode = %self.mode,
      session = %self.session_id,
      %word_id,
      correct,
      time_spent_ms,
      completed = self.words_completed,
      "Completion recorded"
    );

    if !correct && self.policy.fails_on_error() {
      self.failed = true;
      info!(target: "challenge", mode = %self.mode, session = %self.session_id, %word_id, "Session failed on first error");
      return CompletionResult::failed();
    }

    let completed = self.words_completed >= self.target_words;
    CompletionResult { session_completed: completed.then_some(true), ..CompletionResult::continues() }
  }
}
