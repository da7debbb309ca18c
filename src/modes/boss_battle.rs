//! Boss Battle: a fixed-length fight along a piecewise difficulty curve, tagged
//! with a boss phase. The final turn is the hardest unused word in the pool.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use super::{active_core, base_metadata, enhance_turn, init_core, FailurePolicy, ModeDeps, ModeService, NativeTurn, SessionCore, TurnParts};
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, CompletionResult, Metadata, QuizMode, Word};
use crate::error::EngineResult;
use crate::progression::{boss_battle_curve, curve_at};
use crate::selector::{select_hardest_unused, select_word};

const MODE: ChallengeMode = ChallengeMode::BossBattle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BossPhase {
  EarlyBoss,
  MidBoss,
  LateBoss,
  FinalBoss,
}

impl BossPhase {
  pub fn at(words_completed: usize, target_words: usize) -> Self {
    if target_words == 0 || words_completed + 1 >= target_words {
      return BossPhase::FinalBoss;
    }
    let progress = words_completed as f64 / target_words as f64;
    if progress < 0.3 {
      BossPhase::EarlyBoss
    } else if progress < 0.7 {
      BossPhase::MidBoss
    } else {
      BossPhase::LateBoss
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      BossPhase::EarlyBoss => "early-boss",
      BossPhase::MidBoss => "mid-boss",
      BossPhase::LateBoss => "late-boss",
      BossPhase::FinalBoss => "final-boss",
    }
  }

  pub fn quiz_mode(&self) -> QuizMode {
    match self {
      BossPhase::EarlyBoss => QuizMode::MultipleChoice,
      BossPhase::MidBoss => QuizMode::LetterScramble,
      BossPhase::LateBoss | BossPhase::FinalBoss => QuizMode::OpenAnswer,
    }
  }
}

#[derive(Clone, Debug)]
pub struct BossTurn {
  pub word: Word,
  pub phase: BossPhase,
  pub difficulty: f64,
  pub quiz_mode: QuizMode,
  pub ai_enhanced: bool,
  pub reasoning: Vec<String>,
}

impl NativeTurn for BossTurn {
  fn into_parts(self) -> TurnParts {
    let mut metadata = base_metadata(self.difficulty, &self.reasoning);
    metadata.insert("bossPhase".into(), json!(self.phase.as_str()));
    TurnParts { word: Some(self.word), quiz_mode: self.quiz_mode, ai_enhanced: self.ai_enhanced, metadata }
  }
}

pub struct BossBattleService {
  deps: ModeDeps,
  core: Option<SessionCore>,
  curve: Vec<f64>,
}

impl BossBattleService {
  pub fn new(deps: ModeDeps) -> Self {
    Self { deps, core: None, curve: Vec::new() }
  }

  pub fn curve(&self) -> &[f64] {
    &self.curve
  }
}

#[async_trait]
impl ModeService for BossBattleService {
  type Turn = BossTurn;

  fn mode(&self) -> ChallengeMode {
    MODE
  }

  fn core(&self) -> Option<&SessionCore> {
    self.core.as_ref()
  }

  fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()> {
    let target = config.target_words;
    if init_core(&mut self.core, MODE, FailurePolicy::NeverFails, config, &self.deps)? {
      self.curve = boss_battle_curve(target);
    }
    Ok(())
  }

  async fn next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<BossTurn> {
    let core = active_core(&mut self.core, MODE)?;
    core.refresh(ctx);
    core.ensure_pool()?;

    let phase = BossPhase::at(ctx.words_completed, core.target_for(ctx));
    let difficulty = curve_at(&self.curve, ctx.words_completed);

    // The final boss is fixed: hardest unused word, no advisor override.
    if phase == BossPhase::FinalBoss {
      let word = select_hardest_unused(&core.words, &core.progress, &core.used_word_ids).ok_or_else(|| core.no_words())?;
      let quiz_mode = phase.quiz_mode();
      core.present(&word.id, quiz_mode, difficulty);
      return Ok(BossTurn { word, phase, difficulty, quiz_mode, ai_enhanced: false, reasoning: Vec::new() });
    }

    let word = select_word(&core.words, &core.progress, difficulty, &core.used_word_ids).ok_or_else(|| core.no_words())?;
    let enhanced = enhance_turn(&self.deps, core, ctx, word, phase.quiz_mode(), difficulty).await;
    core.present(&enhanced.word.id, enhanced.quiz_mode, difficulty);

    Ok(BossTurn {
      word: enhanced.word,
      phase,
      difficulty,
      quiz_mode: enhanced.quiz_mode,
      ai_enhanced: enhanced.ai_enhanced,
      reasoning: enhanced.reasoning,
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
  use crate::selector::rank_pool;

  #[test]
  fn phases_follow_progress() {
    assert_eq!(BossPhase::at(0, 10), BossPhase::EarlyBoss);
    assert_eq!(BossPhase::at(3, 10), BossPhase::MidBoss);
    assert_eq!(BossPhase::at(7, 10), BossPhase::LateBoss);
    assert_eq!(BossPhase::at(9, 10), BossPhase::FinalBoss);
  }

  #[tokio::test]
  async fn final_turn_of_four_is_final_boss() {
    let mut svc = BossBattleService::new(deps());
    svc.initialize(config(6, 4)).unwrap();
    let parts = svc.next_word(&ctx(3, 4)).await.unwrap().into_parts();
    assert_eq!(parts.metadata.get("bossPhase"), Some(&json!("final-boss")));
  }

  #[tokio::test]
  async fn final_boss_is_hardest_unused_word() {
    let mut svc = BossBattleService::new(deps());
    let mut cfg = config(6, 3);
    cfg.progress = progress_of(&[
      ("w0", seen(95.0, 20, 0)),
      ("w1", seen(90.0, 15, 1)),
      ("w2", seen(5.0, 1, 6)),
      ("w3", seen(10.0, 2, 5)),
      ("w4", seen(85.0, 9, 1)),
      ("w5", seen(80.0, 8, 2)),
    ]);
    let pool = cfg.words.clone();
    let ranking: Vec<String> = rank_pool(&pool, &cfg.progress, chrono::Utc::now()).iter().map(|r| r.word.id.clone()).collect();
    svc.initialize(cfg).unwrap();

    let first = svc.next_word(&ctx(0, 3)).await.unwrap();
    svc.record_completion(&first.word.id, true, 1000, None).unwrap();
    let second = svc.next_word(&ctx(1, 3)).await.unwrap();
    svc.record_completion(&second.word.id, true, 1000, None).unwrap();

    let last = svc.next_word(&ctx(2, 3)).await.unwrap();
    assert_eq!(last.phase, BossPhase::FinalBoss);
    let expected = ranking.iter().find(|id| **id != first.word.id && **id != second.word.id).unwrap();
    assert_eq!(&last.word.id, expected);
  }

  #[test]
  fn curve_is_generated_once_per_session() {
    let mut svc = BossBattleService::new(deps());
    svc.initialize(config(5, 8)).unwrap();
    let c = svc.curve().to_vec();
    assert_eq!(c.len(), 8);
    assert!(c.windows(2).all(|w| w[0] <= w[1]));
    svc.initialize(config(5, 8)).unwrap();
    assert_eq!(svc.curve(), c.as_slice());
  }

  #[tokio::test]
  async fn completions_always_continue() {
    let mut svc = BossBattleService::new(deps());
    svc.initialize(config(5, 4)).unwrap();
    for i in 0..4 {
      let t = svc.next_word(&ctx(i, 4)).await.unwrap();
      assert!(svc.record_completion(&t.word.id, i % 2 == 0, 1200, None).unwrap().session_continues);
    }
  }
}
