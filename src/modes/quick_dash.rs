//! Quick Dash: answer as many words as possible before the clock runs out.
//! Difficulty follows elapsed time rather than turn count, and every turn
//! carries a pacing hint. With the clock at zero no word is handed out.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{active_core, base_metadata, enhance_turn, init_core, word_mastery, FailurePolicy, ModeDeps, ModeService, NativeTurn, SessionCore, TurnParts};
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, QuizMode, Word};
use crate::error::EngineResult;
use crate::progression::quick_dash_difficulty;
use crate::selector::select_word;

const MODE: ChallengeMode = ChallengeMode::QuickDash;
/// Below this per-word budget the advisor round trip costs more than it helps.
const MIN_SECONDS_FOR_ADVISOR: f64 = 5.0;

pub fn dash_quiz_mode(mastery: f64) -> QuizMode {
  if mastery >= 70.0 {
    QuizMode::LetterScramble
  } else {
    QuizMode::MultipleChoice
  }
}

/// Seconds available per remaining word, if the clock is known.
pub fn pacing_hint(time_remaining_secs: Option<f64>, words_completed: usize, target_words: usize) -> Option<f64> {
  let remaining = time_remaining_secs?;
  let words_left = target_words.saturating_sub(words_completed).max(1);
  Some((remaining.max(0.0) / words_left as f64 * 10.0).round() / 10.0)
}

#[derive(Clone, Debug)]
pub struct DashTurn {
  pub word: Option<Word>,
  pub quiz_mode: QuizMode,
  pub difficulty: f64,
  pub seconds_per_word: Option<f64>,
  pub time_expired: bool,
  pub ai_enhanced: bool,
  pub reasoning: Vec<String>,
}

impl NativeTurn for DashTurn {
  fn into_parts(self) -> TurnParts {
    let mut metadata = base_metadata(self.difficulty, &self.reasoning);
    if let Some(s) = self.seconds_per_word {
      metadata.insert("secondsPerWord".into(), json!(s));
    }
    if self.time_expired {
      metadata.insert("timeExpired".into(), json!(true));
    }
    TurnParts { word: self.word, quiz_mode: self.quiz_mode, ai_enhanced: self.ai_enhanced, metadata }
  }
}

pub struct QuickDashService {
  deps: ModeDeps,
  core: Option<SessionCore>,
}

impl QuickDashService {
  pub fn new(deps: ModeDeps) -> Self {
    Self { deps, core: None }
  }
}

#[async_trait]
impl ModeService for QuickDashService {
  type Turn = DashTurn;

  fn mode(&self) -> ChallengeMode {
    MODE
  }

  fn core(&self) -> Option<&SessionCore> {
    self.core.as_ref()
  }

  fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()> {
    init_core(&mut self.core, MODE, FailurePolicy::NeverFails, config, &self.deps)?;
    Ok(())
  }

  async fn next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<DashTurn> {
    let core = active_core(&mut self.core, MODE)?;
    core.refresh(ctx);
    core.ensure_pool()?;

    let difficulty = quick_dash_difficulty(ctx.time_remaining_secs, core.time_limit_secs);
    let seconds_per_word = pacing_hint(ctx.time_remaining_secs, ctx.words_completed, core.target_for(ctx));

    if matches!(ctx.time_remaining_secs, Some(t) if t <= 0.0) {
      debug!(target: "challenge", session = %core.session_id, "Quick dash clock expired");
      return Ok(DashTurn {
        word: None,
        quiz_mode: QuizMode::MultipleChoice,
        difficulty,
        seconds_per_word,
        time_expired: true,
        ai_enhanced: false,
        reasoning: Vec::new(),
      });
    }

    if let Some(s) = seconds_per_word {
      core.strategy.seconds_per_word = s;
    }

    let word = select_word(&core.words, &core.progress, difficulty, &core.used_word_ids).ok_or_else(|| core.no_words())?;
    let baseline = dash_quiz_mode(word_mastery(core, &word));

    let (word, quiz_mode, ai_enhanced, reasoning) = if seconds_per_word.map_or(true, |s| s >= MIN_SECONDS_FOR_ADVISOR) {
      let e = enhance_turn(&self.deps, core, ctx, word, baseline, difficulty).await;
      (e.word, e.quiz_mode, e.ai_enhanced, e.reasoning)
    } else {
      (word, baseline, false, vec!["tight clock: advisor skipped".to_string()])
    };
    core.present(&word.id, quiz_mode, difficulty);

    Ok(DashTurn { word: Some(word), quiz_mode, difficulty, seconds_per_word, time_expired: false, ai_enhanced, reasoning })
  }

  fn record_completion(&mut self, word_id: &str, correct: bool, time_spent_ms: u64, metadata: Option<&Metadata>) -> EngineResult<CompletionResult> {
    let core = active_core(&mut self.core, MODE)?;
    Ok(core.record(word_id, correct, time_spent_ms, metadata))
  }

  fn reset(&mut self) {
    self.core = None;
  }
}
