//! Fill-in-the-Blank: cloze practice on example sentences. Words with context
//! are preferred; a pool without any falls back to multiple choice.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{active_core, base_metadata, enhance_turn, init_core, FailurePolicy, ModeDeps, ModeService, NativeTurn, SessionCore, TurnParts};
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, QuizMode, Word};
use crate::error::EngineResult;
use crate::progression::{curve_at, fill_blank_curve};
use crate::selector::select_word;

const MODE: ChallengeMode = ChallengeMode::FillInTheBlank;
const BLANK: &str = "____";

/// The example sentence with the term blanked out, if the term occurs in it.
pub fn blank_sentence(word: &Word) -> Option<String> {
  let sentence = &word.context.as_ref()?.sentence;
  if word.term.is_empty() || !sentence.contains(word.term.as_str()) {
    return None;
  }
  Some(sentence.replacen(word.term.as_str(), BLANK, 1))
}

#[derive(Clone, Debug)]
pub struct FillBlankTurn {
  pub word: Word,
  pub quiz_mode: QuizMode,
  pub difficulty: f64,
  pub ai_enhanced: bool,
  pub reasoning: Vec<String>,
}

impl NativeTurn for FillBlankTurn {
  fn into_parts(self) -> TurnParts {
    let mut metadata = base_metadata(self.difficulty, &self.reasoning);
    if self.quiz_mode == QuizMode::FillInTheBlank {
      if let Some(s) = blank_sentence(&self.word) {
        metadata.insert("blankedSentence".into(), json!(s));
      }
    }
    TurnParts { word: Some(self.word), quiz_mode: self.quiz_mode, ai_enhanced: self.ai_enhanced, metadata }
  }
}

pub struct FillBlankService {
  deps: ModeDeps,
  core: Option<SessionCore>,
  curve: Vec<f64>,
}

impl FillBlankService {
  pub fn new(deps: ModeDeps) -> Self {
    Self { deps, core: None, curve: Vec::new() }
  }
}

#[async_trait]
impl ModeService for FillBlankService {
  type Turn = FillBlankTurn;

  fn mode(&self) -> ChallengeMode {
    MODE
  }

  fn core(&self) -> Option<&SessionCore> {
    self.core.as_ref()
  }

  fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()> {
    let target = config.target_words;
    if init_core(&mut self.core, MODE, FailurePolicy::NeverFails, config, &self.deps)? {
      self.curve = fill_blank_curve(target);
    }
    Ok(())
  }

  async fn next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<FillBlankTurn> {
    let core = active_core(&mut self.core, MODE)?;
    core.refresh(ctx);
    core.ensure_pool()?;

    let difficulty = curve_at(&self.curve, ctx.words_completed);
    let with_context: Vec<Word> = core.words.iter().filter(|w| w.context.is_some()).cloned().collect();
    let pool = if with_context.is_empty() {
      debug!(target: "challenge", session = %core.session_id, "No example sentences in pool; falling back to multiple choice");
      &core.words
    } else {
      &with_context
    };
    let word = select_word(pool, &core.progress, difficulty, &core.used_word_ids).ok_or_else(|| core.no_words())?;
    let baseline = if word.context.is_some() { QuizMode::FillInTheBlank } else { QuizMode::MultipleChoice };

    let e = enhance_turn(&self.deps, core, ctx, word, baseline, difficulty).await;
    // A cloze needs a sentence to blank.
    let quiz_mode = if e.quiz_mode == QuizMode::FillInTheBlank && e.word.context.is_none() {
      QuizMode::MultipleChoice
    } else {
      e.quiz_mode
    };
    core.present(&e.word.id, quiz_mode, difficulty);

    Ok(FillBlankTurn { word: e.word, quiz_mode, difficulty, ai_enhanced: e.ai_enhanced, reasoning: e.reasoning })
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
