//! Precision mode: zero mistakes allowed. The first wrong answer fails the
//! session until reset. Difficulty, pacing and format are recomputed each
//! turn from an error-risk estimate; higher risk means easier and safer turns.

use async_trait::async_trait;
use serde_json::json;

use super::session::{CognitiveLoad, Strategy};
use super::{active_core, base_metadata, enhance_turn, init_core, FailurePolicy, ModeDeps, ModeService, NativeTurn, SessionCore, TurnParts};
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, QuizMode, Word};
use crate::error::{EngineError, EngineResult};
use crate::progression::{error_risk, RiskBand};
use crate::selector::select_word;

const MODE: ChallengeMode = ChallengeMode::Precision;

/// Strategy for a risk band. Medium risk prefers cloze when context exists.
pub fn strategy_for(band: RiskBand, word_has_context: bool) -> Strategy {
  match band {
    RiskBand::Easy => Strategy {
      seconds_per_word: 20.0,
      preferred_quiz_mode: QuizMode::MultipleChoice,
      cognitive_load: CognitiveLoad::High,
    },
    RiskBand::Medium => Strategy {
      seconds_per_word: 15.0,
      preferred_quiz_mode: if word_has_context { QuizMode::FillInTheBlank } else { QuizMode::MultipleChoice },
      cognitive_load: CognitiveLoad::Medium,
    },
    RiskBand::Hard => Strategy {
      seconds_per_word: 10.0,
      preferred_quiz_mode: QuizMode::OpenAnswer,
      cognitive_load: CognitiveLoad::Low,
    },
  }
}

#[derive(Clone, Debug)]
pub struct PrecisionTurn {
  pub word: Word,
  pub quiz_mode: QuizMode,
  pub risk: f64,
  pub band: RiskBand,
  pub strategy: Strategy,
  pub ai_enhanced: bool,
  pub reasoning: Vec<String>,
}

impl NativeTurn for PrecisionTurn {
  fn into_parts(self) -> TurnParts {
    let mut metadata = base_metadata(self.band.difficulty(), &self.reasoning);
    metadata.insert("errorRisk".into(), json!((self.risk * 100.0).round() / 100.0));
    metadata.insert("riskBand".into(), json!(self.band));
    metadata.insert("strategy".into(), json!(self.strategy));
    TurnParts { word: Some(self.word), quiz_mode: self.quiz_mode, ai_enhanced: self.ai_enhanced, metadata }
  }
}

pub struct PrecisionService {
  deps: ModeDeps,
  core: Option<SessionCore>,
}

impl PrecisionService {
  pub fn new(deps: ModeDeps) -> Self {
    Self { deps, core: None }
  }
}

#[async_trait]
impl ModeService for PrecisionService {
  type Turn = PrecisionTurn;

  fn mode(&self) -> ChallengeMode {
    MODE
  }

  fn core(&self) -> Option<&SessionCore> {
    self.core.as_ref()
  }

  fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()> {
    init_core(&mut self.core, MODE, FailurePolicy::RiskAdaptive, config, &self.deps)?;
    Ok(())
  }

  async fn next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<PrecisionTurn> {
    let core = active_core(&mut self.core, MODE)?;
    if core.is_failed() {
      return Err(EngineError::SessionFailed);
    }
    core.refresh(ctx);
    core.ensure_pool()?;

    let target = core.target_for(ctx);
    let risk = error_risk(ctx.words_completed, target, core.incorrect_total, core.hesitations(), core.strategy.preferred_quiz_mode);
    let band = RiskBand::from_risk(risk);
    let difficulty = band.difficulty();

    let word = select_word(&core.words, &core.progress, difficulty, &core.used_word_ids).ok_or_else(|| core.no_words())?;
    let strategy = strategy_for(band, word.context.is_some());
    core.strategy = strategy.clone();

    let mut reasoning = vec![format!("error risk {:.2} -> {:?} turn", risk, band)];
    let enhanced = enhance_turn(&self.deps, core, ctx, word, strategy.preferred_quiz_mode, difficulty).await;
    reasoning.extend(enhanced.reasoning);
    core.present(&enhanced.word.id, enhanced.quiz_mode, difficulty);

    Ok(PrecisionTurn {
      word: enhanced.word,
      quiz_mode: enhanced.quiz_mode,
      risk,
      band,
      strategy,
      ai_enhanced: enhanced.ai_enhanced,
      reasoning,
    })
  }

  fn record_completion(&mut self, word_id: &str, correct: bool, time_spent_ms: u64, metadata: Option<&Metadata>) -> EngineResult<CompletionResult> {
    let core = active_core(&mut self.core, MODE)?;
    let mut result = core.record(word_id, correct, time_spent_ms, metadata);
    if result.session_continues && result.session_completed == Some(true) {
      // A flawless run ends the session.
      result.session_continues = false;
    }
    Ok(result)
  }

  fn reset(&mut self) {
    self.core = None;
  }
}
