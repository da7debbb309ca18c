//! Deep Dive: slower, richer practice. Turns rotate through enhanced formats
//! (contextual analysis, usage example, synonym/antonym) that are remapped
//! onto the four renderable quiz modes according to the word's mastery.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::{active_core, base_metadata, enhance_turn, init_core, FailurePolicy, ModeDeps, ModeService, NativeTurn, SessionCore, TurnParts};
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, QuizMode, Word, WordProgress};
use crate::error::EngineResult;
use crate::mastery::direction_mastery;
use crate::progression::{curve_at, deep_dive_curve};
use crate::selector::select_word;

const MODE: ChallengeMode = ChallengeMode::DeepDive;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnhancedQuizMode {
  ContextualAnalysis,
  UsageExample,
  SynonymAntonym,
}

impl EnhancedQuizMode {
  const ROTATION: [EnhancedQuizMode; 3] =
    [EnhancedQuizMode::ContextualAnalysis, EnhancedQuizMode::UsageExample, EnhancedQuizMode::SynonymAntonym];

  pub fn for_turn(words_completed: usize) -> Self {
    Self::ROTATION[words_completed % Self::ROTATION.len()]
  }
}

/// Map an enhanced format onto a renderable quiz mode.
/// Brand-new words always get multiple choice.
pub fn remap_enhanced(mode: EnhancedQuizMode, word: &Word, progress: Option<&WordProgress>) -> QuizMode {
  let Some(p) = progress.filter(|p| p.attempts() > 0) else {
    return QuizMode::MultipleChoice;
  };
  match mode {
    EnhancedQuizMode::ContextualAnalysis if word.context.is_some() => QuizMode::FillInTheBlank,
    EnhancedQuizMode::ContextualAnalysis => QuizMode::OpenAnswer,
    EnhancedQuizMode::UsageExample if direction_mastery(p, word.direction(), Utc::now()) >= 50.0 => QuizMode::OpenAnswer,
    EnhancedQuizMode::UsageExample => QuizMode::LetterScramble,
    EnhancedQuizMode::SynonymAntonym => QuizMode::MultipleChoice,
  }
}

#[derive(Clone, Debug)]
pub struct DeepDiveTurn {
  pub word: Word,
  pub enhanced_mode: EnhancedQuizMode,
  pub quiz_mode: QuizMode,
  pub difficulty: f64,
  pub ai_enhanced: bool,
  pub reasoning: Vec<String>,
}

impl NativeTurn for DeepDiveTurn {
  fn into_parts(self) -> TurnParts {
    let mut metadata = base_metadata(self.difficulty, &self.reasoning);
    metadata.insert("enhancedMode".into(), json!(self.enhanced_mode));
    if let Some(c) = &self.word.context {
      metadata.insert("exampleSentence".into(), json!(c.sentence));
    }
    TurnParts { word: Some(self.word), quiz_mode: self.quiz_mode, ai_enhanced: self.ai_enhanced, metadata }
  }
}

pub struct DeepDiveService {
  deps: ModeDeps,
  core: Option<SessionCore>,
  curve: Vec<f64>,
}

impl DeepDiveService {
  pub fn new(deps: ModeDeps) -> Self {
    Self { deps, core: None, curve: Vec::new() }
  }
}

#[async_trait]
impl ModeService for DeepDiveService {
  type Turn = DeepDiveTurn;

  fn mode(&self) -> ChallengeMode {
    MODE
  }

  fn core(&self) -> Option<&SessionCore> {
    self.core.as_ref()
  }

  fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()> {
    let target = config.target_words;
    if init_core(&mut self.core, MODE, FailurePolicy::NeverFails, config, &self.deps)? {
      self.curve = deep_dive_curve(target);
    }
    Ok(())
  }

  async fn next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<DeepDiveTurn> {
    let core = active_core(&mut self.core, MODE)?;
    core.refresh(ctx);
    core.ensure_pool()?;

    let difficulty = curve_at(&self.curve, ctx.words_completed);
    let word = select_word(&core.words, &core.progress, difficulty, &core.used_word_ids).ok_or_else(|| core.no_words())?;
    let enhanced_mode = EnhancedQuizMode::for_turn(ctx.words_completed);
    let baseline = remap_enhanced(enhanced_mode, &word, core.progress.get(&word.id));

    let e = enhance_turn(&self.deps, core, ctx, word, baseline, difficulty).await;
    // An advisor-swapped word still has to respect the new-word rule.
    let quiz_mode = if core.progress.get(&e.word.id).map_or(true, |p| p.attempts() == 0) {
      QuizMode::MultipleChoice
    } else {
      e.quiz_mode
    };
    core.present(&e.word.id, quiz_mode, difficulty);

    Ok(DeepDiveTurn { word: e.word, enhanced_mode, quiz_mode, difficulty, ai_enhanced: e.ai_enhanced, reasoning: e.reasoning })
  }

  fn record_completion(&mut self, word_id: &str, correct: bool, time_spent_ms: u64, metadata: Option<&Metadata>) -> EngineResult<CompletionResult> {
    let core = active_core(&mut self.core, MODE)?;
    Ok(core.record(word_id, correct, time_spent_ms, metadata))
  }

  fn reset(&mut self) {
    self.core = None;
    self.curve.clear();
  }
}
