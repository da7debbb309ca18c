//! Streak mode: keep answering; difficulty climbs along a seeded curve plus a
//! bonus for the live streak. Mistakes reset the streak, never the session.

use async_trait::async_trait;
use serde_json::json;

use super::{active_core, base_metadata, enhance_turn, init_core, word_mastery, FailurePolicy, ModeDeps, ModeService, NativeTurn, SessionCore, TurnParts};
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, QuizMode, Word};
use crate::error::EngineResult;
use crate::progression::{curve_at, streak_bonus, streak_curve};
use crate::selector::select_word;

const MODE: ChallengeMode = ChallengeMode::Streak;
const MILESTONE_EVERY: u32 = 5;

/// Baseline format climbs with mastery.
pub fn streak_quiz_mode(mastery: f64) -> QuizMode {
  if mastery < 30.0 {
    QuizMode::MultipleChoice
  } else if mastery < 60.0 {
    QuizMode::LetterScramble
  } else {
    QuizMode::OpenAnswer
  }
}

#[derive(Clone, Debug)]
pub struct StreakTurn {
  pub word: Word,
  pub quiz_mode: QuizMode,
  pub difficulty: f64,
  pub streak: u32,
  pub milestone: Option<u32>,
  pub ai_enhanced: bool,
  pub reasoning: Vec<String>,
}

impl NativeTurn for StreakTurn {
  fn into_parts(self) -> TurnParts {
    let mut metadata = base_metadata(self.difficulty, &self.reasoning);
    metadata.insert("streak".into(), json!(self.streak));
    if let Some(m) = self.milestone {
      metadata.insert("milestone".into(), json!(m));
    }
    TurnParts { word: Some(self.word), quiz_mode: self.quiz_mode, ai_enhanced: self.ai_enhanced, metadata }
  }
}

pub struct StreakService {
  deps: ModeDeps,
  core: Option<SessionCore>,
  curve: Vec<f64>,
}

impl StreakService {
  pub fn new(deps: ModeDeps) -> Self {
    Self { deps, core: None, curve: Vec::new() }
  }

  pub fn curve(&self) -> &[f64] {
    &self.curve
  }
}

#[async_trait]
impl ModeService for StreakService {
  type Turn = StreakTurn;

  fn mode(&self) -> ChallengeMode {
    MODE
  }

  fn core(&self) -> Option<&SessionCore> {
    self.core.as_ref()
  }

  fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()> {
    let (target, seed) = (config.target_words, config.difficulty_seed);
    if init_core(&mut self.core, MODE, FailurePolicy::NeverFails, config, &self.deps)? {
      self.curve = streak_curve(target, seed);
    }
    Ok(())
  }

  async fn next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<StreakTurn> {
    let core = active_core(&mut self.core, MODE)?;
    core.refresh(ctx);
    core.ensure_pool()?;

    let difficulty = (curve_at(&self.curve, ctx.words_completed) + streak_bonus(ctx.current_streak)).min(100.0);
    let word = select_word(&core.words, &core.progress, difficulty, &core.used_word_ids)
      .ok_or_else(|| core.no_words())?;
    let baseline = streak_quiz_mode(word_mastery(core, &word));

    let mut reasoning = Vec::new();
    let milestone = (ctx.current_streak > 0 && ctx.current_streak % MILESTONE_EVERY == 0).then_some(ctx.current_streak);
    if let Some(m) = milestone {
      reasoning.push(format!("streak milestone reached: {m} in a row"));
    }

    let enhanced = enhance_turn(&self.deps, core, ctx, word, baseline, difficulty).await;
    reasoning.extend(enhanced.reasoning);
    core.present(&enhanced.word.id, enhanced.quiz_mode, difficulty);

    Ok(StreakTurn {
      word: enhanced.word,
      quiz_mode: enhanced.quiz_mode,
      difficulty,
      streak: ctx.current_streak,
      milestone,
      ai_enhanced: enhanced.ai_enhanced,
      reasoning,
    })
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

#[cfg(test)]
mod tests {
  use super::super::fixtures::*;
  use super::*;
  use crate::error::EngineError;

  #[tokio::test]
  async fn requires_initialize() {
    let mut svc = StreakService::new(deps());
    assert!(matches!(svc.next_word(&ctx(0, 3)).await, Err(EngineError::NotInitialized { .. })));
    assert!(matches!(svc.record_completion("w0", true, 100, None), Err(EngineError::NotInitialized { .. })));
  }

  #[tokio::test]
  async fn wrong_answers_never_end_the_session() {
    let mut svc = StreakService::new(deps());
    svc.initialize(config(5, 3)).unwrap();
    for i in 0..6 {
      let turn = svc.next_word(&ctx(i, 3)).await.unwrap();
      let r = svc.record_completion(&turn.word.id, false, 1000, None).unwrap();
      assert!(r.session_continues);
      assert_eq!(r.session_failed, None);
    }
    assert!(!svc.has_session_failed());
  }

  #[tokio::test]
  async fn does_not_repeat_until_pool_is_used() {
    let mut svc = StreakService::new(deps());
    svc.initialize(config(5, 5)).unwrap();
    let mut seen = std::collections::HashSet::new();
    for i in 0..5 {
      let turn = svc.next_word(&ctx(i, 5)).await.unwrap();
      assert!(seen.insert(turn.word.id.clone()), "repeat at turn {i}");
      svc.record_completion(&turn.word.id, true, 800, None).unwrap();
    }
    let extra = svc.next_word(&ctx(5, 5)).await.unwrap();
    assert!(seen.contains(&extra.word.id));
  }

  #[tokio::test]
  async fn milestone_is_reported() {
    let mut svc = StreakService::new(deps());
    svc.initialize(config(5, 10)).unwrap();
    let mut c = ctx(5, 10);
    c.current_streak = 5;
    let parts = svc.next_word(&c).await.unwrap().into_parts();
    assert_eq!(parts.metadata.get("milestone"), Some(&json!(5)));
    assert_eq!(parts.metadata.get("streak"), Some(&json!(5)));
  }

  #[tokio::test]
  async fn inconsistent_turn_snapshot_is_flagged() {
    use crate::domain::{DirectionStats, DirectionalProgress};

    let mut svc = StreakService::new(deps());
    svc.initialize(config(5, 5)).unwrap();
    assert_eq!(svc.core().unwrap().integrity_mismatches, 0);

    let mut bad = seen(40.0, 3, 1);
    bad.directions = Some(DirectionalProgress {
      term_to_definition: DirectionStats { correct_count: 1, ..Default::default() },
      definition_to_term: DirectionStats::default(),
    });
    let mut c = ctx(0, 5);
    c.progress = progress_of(&[("w1", bad), ("w2", seen(20.0, 1, 0))]);

    assert!(svc.next_word(&c).await.is_ok());
    assert_eq!(svc.core().unwrap().integrity_mismatches, 1);
    assert!(svc.core().unwrap().progress.contains_key("w1"));
  }

  #[tokio::test]
  async fn empty_pool_is_an_error() {
    let mut svc = StreakService::new(deps());
    svc.initialize(config(0, 3)).unwrap();
    assert!(matches!(svc.next_word(&ctx(0, 3)).await, Err(EngineError::NoWordsAvailable { .. })));
  }

  #[test]
  fn reinitialize_same_scope_is_a_no_op() {
    let mut svc = StreakService::new(deps());
    svc.initialize(config(5, 3)).unwrap();
    let id = svc.core().unwrap().session_id;
    svc.initialize(config(5, 3)).unwrap();
    assert_eq!(svc.core().unwrap().session_id, id);
    svc.reset();
    assert!(svc.core().is_none());
    assert!(svc.curve().is_empty());
  }

  #[tokio::test]
  async fn advisor_override_marks_the_word_used() {
    use crate::gateway::testing::{Script, ScriptedGateway};
    use crate::gateway::EnhancementResponse;
    use std::sync::Arc;

    let gw = Arc::new(ScriptedGateway::new(Script::Respond(EnhancementResponse {
      intervention_needed: true,
      selected_word_id: Some("w4".into()),
      ai_recommended_mode: None,
      reasoning: vec!["w4 is overdue".into()],
    })));
    let mut svc = StreakService::new(ModeDeps::new(gw.clone()));
    svc.initialize(config(5, 3)).unwrap();

    let turn = svc.next_word(&ctx(0, 3)).await.unwrap();
    assert!(turn.ai_enhanced);
    assert_eq!(turn.word.id, "w4");
    assert_eq!(turn.quiz_mode, QuizMode::MultipleChoice);
    assert!(svc.core().unwrap().used_word_ids.contains("w4"));
    assert_eq!(gw.calls(), 1);
  }

  #[test]
  fn baseline_mode_tracks_mastery() {
    assert_eq!(streak_quiz_mode(0.0), QuizMode::MultipleChoice);
    assert_eq!(streak_quiz_mode(45.0), QuizMode::LetterScramble);
    assert_eq!(streak_quiz_mode(90.0), QuizMode::OpenAnswer);
  }
}
