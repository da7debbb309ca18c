//! Adapter layer: one polymorphic `ChallengeService` contract over the six
//! mode services. Normalizes native turns into `ChallengeResult`s and builds
//! module-scoped answer options for multiple-choice turns.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;
use tracing::{debug, instrument};

use crate::corpus::Corpus;
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, ChallengeResult, CompletionResult, Metadata, QuizDirection, Word};
use crate::error::EngineResult;
use crate::modes::{ModeService, NativeTurn};

/// Correct answer plus distractors.
pub const OPTION_COUNT: usize = 4;

/// Caller-facing contract shared by every mode.
#[async_trait]
pub trait ChallengeService: Send + Sync {
  fn mode(&self) -> ChallengeMode;

  async fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()>;

  async fn get_next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<ChallengeResult>;

  fn record_completion(
    &mut self,
    word_id: &str,
    correct: bool,
    time_spent_ms: u64,
    metadata: Option<&Metadata>,
  ) -> EngineResult<CompletionResult>;

  fn reset(&mut self);

  fn has_session_failed(&self) -> bool;
}

/// Build the options for a multiple-choice turn.
///
/// Distractors come from the word's own module first and are padded from the
/// language pool only when the module can't supply enough distinct answers.
/// The correct answer never appears twice.
pub fn generate_options<R: rand::Rng + ?Sized>(
  word: &Word,
  direction: QuizDirection,
  module_pool: &[Word],
  language_pool: &[Word],
  rng: &mut R,
) -> Vec<String> {
  let correct = word.answer_for(direction).to_string();
  let mut seen: HashSet<String> = HashSet::from([correct.clone()]);
  let mut distractors: Vec<String> = Vec::with_capacity(OPTION_COUNT - 1);

  let mut take_from = |pool: &[Word], distractors: &mut Vec<String>, rng: &mut R| {
    let mut candidates: Vec<&Word> = pool.iter().filter(|w| w.id != word.id).collect();
    candidates.shuffle(rng);
    for c in candidates {
      if distractors.len() == OPTION_COUNT - 1 {
        break;
      }
      let answer = c.answer_for(direction).trim();
      if answer.is_empty() || !seen.insert(answer.to_string()) {
        continue;
      }
      distractors.push(answer.to_string());
    }
  };

  take_from(module_pool, &mut distractors, &mut *rng);
  if distractors.len() < OPTION_COUNT - 1 {
    take_from(language_pool, &mut distractors, &mut *rng);
  }

  let mut options = distractors;
  options.push(correct);
  options.shuffle(rng);
  options
}

/// Wraps a mode service with option generation and result normalization.
pub struct ModeAdapter<M: ModeService> {
  service: M,
  corpus: Arc<dyn Corpus>,
  rng: StdRng,
  language: String,
  session_pool: Vec<Word>,
}

impl<M: ModeService> ModeAdapter<M> {
  pub fn new(service: M, corpus: Arc<dyn Corpus>) -> Self {
    Self { service, corpus, rng: StdRng::from_entropy(), language: String::new(), session_pool: Vec::new() }
  }

  /// The session's own words first, then whatever the corpus knows for the
  /// language. Caller-supplied pools may carry modules the corpus lacks.
  fn language_pool(&self) -> Vec<Word> {
    let mut ids: HashSet<String> = self.session_pool.iter().map(|w| w.id.clone()).collect();
    let mut pool = self.session_pool.clone();
    pool.extend(self.corpus.words_for_scope(&self.language, None).into_iter().filter(|w| ids.insert(w.id.clone())));
    pool
  }

  fn options_for(&mut self, word: &Word, direction: QuizDirection) -> Vec<String> {
    let language_pool = self.language_pool();
    let module_pool: Vec<Word> = match word.module_id.as_deref() {
      Some(m) => language_pool.iter().filter(|w| w.module_id.as_deref() == Some(m)).cloned().collect(),
      None => Vec::new(),
    };
    generate_options(word, direction, &module_pool, &language_pool, &mut self.rng)
  }
}

#[async_trait]
impl<M: ModeService> ChallengeService for ModeAdapter<M> {
  fn mode(&self) -> ChallengeMode {
    self.service.mode()
  }

  async fn initialize(&mut self, config: ChallengeConfig) -> EngineResult<()> {
    self.rng = match config.rng_seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    self.language = config.language.clone();
    self.session_pool = config.words.clone();
    self.service.initialize(config)
  }

  #[instrument(level = "debug", target = "challenge", skip_all, fields(mode = %self.service.mode(), done = ctx.words_completed))]
  async fn get_next_word(&mut self, ctx: &ChallengeContext) -> EngineResult<ChallengeResult> {
    let parts = self.service.next_word(ctx).await?.into_parts();
    let direction = parts.word.as_ref().map(|w| w.direction()).unwrap_or_default();

    let options = match &parts.word {
      Some(w) if parts.quiz_mode.has_options() => self.options_for(w, direction),
      _ => Vec::new(),
    };

    let mut metadata = parts.metadata;
    metadata.insert("mode".into(), json!(self.service.mode().as_str()));

    debug!(
      target: "challenge",
      word = ?parts.word.as_ref().map(|w| w.id.as_str()),
      quiz_mode = parts.quiz_mode.as_str(),
      options = options.len(),
      ai_enhanced = parts.ai_enhanced,
      "Turn normalized"
    );

    Ok(ChallengeResult { word: parts.word, options, quiz_mode: parts.quiz_mode, direction, ai_enhanced: parts.ai_enhanced, metadata })
  }

  fn record_completion(&mut self, word_id: &str, correct: bool, time_spent_ms: u64, metadata: Option<&Metadata>) -> EngineResult<CompletionResult> {
    self.service.record_completion(word_id, correct, time_spent_ms, metadata)
  }

  fn reset(&mut self) {
    self.service.reset();
    self.session_pool.clear();
  }

  fn has_session_failed(&self) -> bool {
    self.service.has_session_failed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuizMode;
  use crate::modes::fixtures::{config, ctx, deps, words};
  use crate::modes::{BossBattleService, DeepDiveService, FillBlankService, PrecisionService, QuickDashService, StreakService};
  use crate::seeds::seed_corpus;

  fn word(id: &str, def: &str, module: &str) -> Word {
    Word {
      id: id.into(),
      term: format!("t-{id}"),
      definition: def.into(),
      level: None,
      module_id: Some(module.into()),
      context: None,
      preferred_direction: None,
    }
  }

  #[test]
  fn options_prefer_module_and_exclude_correct_answer() {
    let target = word("a", "cat", "animals");
    let module = vec![target.clone(), word("b", "dog", "animals"), word("c", "cow", "animals"), word("d", "owl", "animals")];
    let mut language = module.clone();
    language.push(word("e", "bread", "food"));
    let mut rng = StdRng::seed_from_u64(1);

    let opts = generate_options(&target, QuizDirection::TermToDefinition, &module, &language, &mut rng);
    assert_eq!(opts.len(), 4);
    assert_eq!(opts.iter().filter(|o| *o == "cat").count(), 1);
    assert!(!opts.contains(&"bread".to_string()));
  }

  #[test]
  fn small_module_pads_from_language_pool() {
    let target = word("a", "cat", "animals");
    let module = vec![target.clone(), word("b", "dog", "animals")];
    let mut language = module.clone();
    language.extend([word("e", "bread", "food"), word("f", "milk", "food"), word("g", "cat", "food")]);
    let mut rng = StdRng::seed_from_u64(2);

    let opts = generate_options(&target, QuizDirection::TermToDefinition, &module, &language, &mut rng);
    assert_eq!(opts.len(), 4);
    assert!(opts.contains(&"dog".to_string()));
    assert_eq!(opts.iter().filter(|o| *o == "cat").count(), 1);
  }

  #[test]
  fn reverse_direction_offers_terms() {
    let target = word("a", "cat", "animals");
    let module = vec![target.clone(), word("b", "dog", "animals")];
    let mut rng = StdRng::seed_from_u64(3);
    let opts = generate_options(&target, QuizDirection::DefinitionToTerm, &module, &module, &mut rng);
    assert_eq!(opts.len(), 2);
    assert!(opts.contains(&"t-a".to_string()) && opts.contains(&"t-b".to_string()));
  }

  #[tokio::test]
  async fn every_mode_satisfies_the_contract() {
    let corpus: Arc<dyn Corpus> = Arc::new(seed_corpus());
    let services: Vec<Box<dyn ChallengeService>> = vec![
      Box::new(ModeAdapter::new(StreakService::new(deps()), corpus.clone())),
      Box::new(ModeAdapter::new(BossBattleService::new(deps()), corpus.clone())),
      Box::new(ModeAdapter::new(PrecisionService::new(deps()), corpus.clone())),
      Box::new(ModeAdapter::new(QuickDashService::new(deps()), corpus.clone())),
      Box::new(ModeAdapter::new(DeepDiveService::new(deps()), corpus.clone())),
      Box::new(ModeAdapter::new(FillBlankService::new(deps()), corpus.clone())),
    ];
    for mut svc in services {
      svc.initialize(config(6, 3)).await.unwrap();
      let r = svc.get_next_word(&ctx(0, 3)).await.unwrap();
      let w = r.word.expect("word");
      assert_eq!(r.metadata.get("mode"), Some(&json!(svc.mode().as_str())));
      if r.quiz_mode == QuizMode::MultipleChoice {
        assert!(!r.options.is_empty());
        assert!(r.options.contains(&w.definition));
      } else {
        assert!(r.options.is_empty());
      }
      assert!(svc.record_completion(&w.id, true, 1000, None).unwrap().session_continues);
      svc.reset();
      assert!(!svc.has_session_failed());
    }
  }

  #[tokio::test]
  async fn unknown_language_uses_session_pool_for_options() {
    let corpus: Arc<dyn Corpus> = Arc::new(seed_corpus());
    let mut svc = ModeAdapter::new(StreakService::new(deps()), corpus);
    let mut cfg = config(6, 3);
    cfg.language = "xx".into();
    svc.initialize(cfg).await.unwrap();
    let mut c = ctx(0, 3);
    c.language = "xx".into();
    let r = svc.get_next_word(&c).await.unwrap();
    assert_eq!(r.quiz_mode, QuizMode::MultipleChoice);
    assert_eq!(r.options.len(), 4);
    let pool: HashSet<String> = words(6).into_iter().map(|w| w.definition).collect();
    assert!(r.options.iter().all(|o| pool.contains(o)));
  }

  #[tokio::test]
  async fn caller_module_supplies_distractors_in_known_language() {
    let corpus: Arc<dyn Corpus> = Arc::new(seed_corpus());
    let mut svc = ModeAdapter::new(QuickDashService::new(deps()), corpus);
    let colors: Vec<Word> = [("c1", "red"), ("c2", "blue"), ("c3", "green"), ("c4", "yellow"), ("c5", "black")]
      .into_iter()
      .map(|(id, def)| word(id, def, "colors"))
      .collect();
    let palette: HashSet<String> = colors.iter().map(|w| w.definition.clone()).collect();
    let cfg = ChallengeConfig { language: "es".into(), target_words: 5, words: colors, rng_seed: Some(11), ..Default::default() };
    svc.initialize(cfg).await.unwrap();

    for done in 0..5 {
      let r = svc.get_next_word(&ctx(done, 5)).await.unwrap();
      let w = r.word.expect("word");
      assert_eq!(r.quiz_mode, QuizMode::MultipleChoice);
      assert_eq!(r.options.len(), OPTION_COUNT);
      assert!(r.options.iter().all(|o| palette.contains(o)), "{:?}", r.options);
      assert_eq!(r.options.iter().filter(|o| **o == w.definition).count(), 1);
      svc.record_completion(&w.id, true, 800, None).unwrap();
    }
  }

  async fn play(svc: &mut dyn ChallengeService, turns: usize) -> Vec<ChallengeResult> {
    let mut out = Vec::with_capacity(turns);
    for done in 0..turns {
      let r = svc.get_next_word(&ctx(done, turns)).await.unwrap();
      let id = r.word.as_ref().map(|w| w.id.clone()).unwrap_or_default();
      svc.record_completion(&id, done % 3 != 1, 1200, None).unwrap();
      out.push(r);
    }
    out
  }

  async fn assert_reset_matches_fresh(mut fresh: Box<dyn ChallengeService>, mut reused: Box<dyn ChallengeService>) {
    let turns = 6;
    fresh.initialize(config(10, turns)).await.unwrap();
    let expected = play(fresh.as_mut(), turns).await;

    reused.initialize(config(10, turns)).await.unwrap();
    play(reused.as_mut(), 3).await;
    reused.reset();
    reused.initialize(config(10, turns)).await.unwrap();
    let replay = play(reused.as_mut(), turns).await;

    for (i, (a, b)) in expected.iter().zip(&replay).enumerate() {
      assert_eq!(a.word.as_ref().map(|w| &w.id), b.word.as_ref().map(|w| &w.id), "word on turn {i}");
      assert_eq!(a.quiz_mode, b.quiz_mode, "quiz mode on turn {i}");
      assert_eq!(a.options, b.options, "options on turn {i}");
      assert_eq!(a.metadata, b.metadata, "metadata on turn {i}");
    }
  }

  #[tokio::test]
  async fn reset_then_initialize_replays_like_a_fresh_streak() {
    let corpus: Arc<dyn Corpus> = Arc::new(seed_corpus());
    assert_reset_matches_fresh(
      Box::new(ModeAdapter::new(StreakService::new(deps()), corpus.clone())),
      Box::new(ModeAdapter::new(StreakService::new(deps()), corpus)),
    )
    .await;
  }

  #[tokio::test]
  async fn reset_then_initialize_replays_like_a_fresh_boss_battle() {
    let corpus: Arc<dyn Corpus> = Arc::new(seed_corpus());
    assert_reset_matches_fresh(
      Box::new(ModeAdapter::new(BossBattleService::new(deps()), corpus.clone())),
      Box::new(ModeAdapter::new(BossBattleService::new(deps()), corpus)),
    )
    .await;
  }
}
