//! The six per-mode state machines.
//!
//! Each mode owns an optional `SessionCore` (None = uninitialized), supplies its
//! own difficulty curve and failure policy, and returns a native turn type. The
//! adapter layer turns those native turns into `ChallengeResult`s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, QuizMode, Word};
use crate::error::{EngineError, EngineResult};
use crate::gateway::{consult_gateway, AiContext, AiGateway, Enhancement, EnhancementRequest, DEFAULT_GATEWAY_TIMEOUT};
use crate::mastery::direction_mastery;

pub mod boss_battle;
pub mod deep_dive;
pub mod fill_blank;
pub mod precision;
pub mod quick_dash;
pub mod session;
pub mod streak;

pub use self::boss_battle::BossBattleService;
pub use self::session::{FailurePolicy, SessionCore};
pub use self::deep_dive::DeepDiveService;
pub use self::fill_blank::FillBlankService;
pub use self::precision::PrecisionService;
pub use self::quick_dash::QuickDashService;
pub use self::streak::StreakService;

const AI_CANDIDATE_LIMIT: usize = 12;

/// Collaborators injected into every mode service.
#[derive(Clone)]
pub struct ModeDeps {
  pub gateway: Arc<dyn AiGateway>,
  pub gateway_timeout: Duration,
  pub history_len: usize,
}

impl ModeDeps {
  pub fn new(gateway: Arc<dyn AiGateway>) -> Self {
    Self { gateway, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT, history_len: 6 }
  }
}

/// A mode's native turn, before normalization.
#[derive(Clone, Debug)]
pub struct TurnParts {
  pub word: Option<Word>,
  pub quiz_mode: QuizMode,
  pub ai_enhanced: bool,
  pub metadata: Metadata,
}

pub trait NativeTurn {
  fn into_parts(self) -> TurnParts;
}

#[async_trait]
pub trait ModeService: Send + Sync {
  type Turn: NativeTurn + Send;

  fn mode(&self) -> ChallengeMode;

  fn core(&self) -> Option<&SessionCore>;

  /// Allocate session state. Idempotent for an active session with the same scope.
  fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()>;

  async fn next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<Self::Turn>;

  fn record_completion(
    &mut self,
    word_id: &str,
    correct: bool,
    time_spent_ms: u64,
    metadata: Option<&Metadata>,
  ) -> EngineResult<CompletionResult>;

  fn reset(&mut self);

  fn has_session_failed(&self) -> bool {
    self.core().map(|c| c.is_failed()).unwrap_or(false)
  }
}

/// Shared initialize: keeps an active session on a duplicate trigger for the
/// same scope, otherwise builds a fresh core. Returns true when a new core was built.
pub(crate) fn init_core(
  slot: &mut Option<SessionCore>,
  mode: ChallengeMode,
  policy: FailurePolicy,
  config: ChallengeConfig,
  deps: &ModeDeps,
) -> EngineResult<bool> {
  if let Some(existing) = slot.as_ref() {
    if existing.same_scope(&config) {
      tracing::debug!(target: "challenge", mode = %mode, session = %existing.session_id, "Duplicate initialize for same scope ignored");
      return Ok(false);
    }
  }
  let ai_available = deps.gateway.is_available();
  *slot = Some(SessionCore::new(mode, policy, config, ai_available, deps.history_len)?);
  Ok(true)
}

pub(crate) fn active_core(slot: &mut Option<SessionCore>, mode: ChallengeMode) -> EngineResult<&mut SessionCore> {
  slot.as_mut().ok_or(EngineError::NotInitialized { mode })
}

/// Consult the gateway for a planned turn, degrading to the plan on any failure.
pub(crate) async fn enhance_turn(
  deps: &ModeDeps,
  core: &SessionCore,
  ctx: &ChallengeContext,
  word: Word,
  baseline: QuizMode,
  difficulty: f64,
) -> Enhancement {
  let request = EnhancementRequest {
    progress: core.progress.get(&word.id).cloned(),
    word,
    baseline_mode: baseline,
    context: AiContext {
      mode: core.mode,
      words_completed: ctx.words_completed,
      target_words: core.target_for(ctx),
      current_streak: ctx.current_streak,
      difficulty,
      recent_accuracy: core.recent_accuracy(),
      candidate_ids: core.candidate_ids(AI_CANDIDATE_LIMIT),
    },
  };
  consult_gateway(deps.gateway.as_ref(), core.ai_available, deps.gateway_timeout, &core.words, request).await
}

/// Mastery of a word, in its quiz direction, from the session's progress snapshot.
pub(crate) fn word_mastery(core: &SessionCore, word: &Word) -> f64 {
  match core.progress.get(&word.id) {
    Some(p) => direction_mastery(p, word.direction(), Utc::now()),
    None => 0.0,
  }
}

/// Common metadata every mode reports.
pub(crate) fn base_metadata(difficulty: f64, reasoning: &[String]) -> Metadata {
  let mut m = Metadata::new();
  m.insert("difficulty".into(), serde_json::json!((difficulty * 10.0).round() / 10.0));
  if !reasoning.is_empty() {
    m.insert("reasoning".into(), serde_json::json!(reasoning));
  }
  m
}
