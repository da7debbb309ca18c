//! End-to-end flows through the session manager with the seed corpus and
//! scripted advisors.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use caatuu_engine::config::EngineConfig;
use caatuu_engine::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, QuizMode};
use caatuu_engine::gateway::{AiGateway, EnhancementRequest, EnhancementResponse, GatewayError, NullGateway};
use caatuu_engine::{AppState, EngineError, SessionManager};
use serde_json::json;

enum Reply {
  Override { word_id: &'static str, mode: &'static str },
  Fail,
  Hang,
}

struct FakeAdvisor {
  reply: Reply,
  calls: AtomicUsize,
}

impl FakeAdvisor {
  fn new(reply: Reply) -> Arc<Self> {
    Arc::new(Self { reply, calls: AtomicUsize::new(0) })
  }
}

#[async_trait]
impl AiGateway for FakeAdvisor {
  fn is_available(&self) -> bool {
    true
  }

  async fn enhance(&self, _request: &EnhancementRequest) -> Result<EnhancementResponse, GatewayError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match &self.reply {
      Reply::Override { word_id, mode } => Ok(EnhancementResponse {
        intervention_needed: true,
        selected_word_id: Some(word_id.to_string()),
        ai_recommended_mode: Some(mode.to_string()),
        reasoning: vec!["learner keeps missing this one".into()],
      }),
      Reply::Fail => Err(GatewayError::Unavailable),
      Reply::Hang => {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(EnhancementResponse::default())
      }
    }
  }
}

fn manager_with(gateway: Arc<dyn AiGateway>) -> SessionManager {
  let mut cfg = EngineConfig::default();
  cfg.gateway.timeout_ms = 200;
  AppState::with_gateway(&cfg, gateway).sessions
}

fn scope(language: &str, module: Option<&str>, target: usize) -> ChallengeConfig {
  ChallengeConfig {
    language: language.into(),
    module_id: module.map(str::to_string),
    target_words: target,
    rng_seed: Some(42),
    ..Default::default()
  }
}

fn turn(done: usize, streak: u32) -> ChallengeContext {
  ChallengeContext { words_completed: done, current_streak: streak, ..Default::default() }
}

#[tokio::test]
async fn streak_session_runs_to_target_without_repeats() {
  let m = manager_with(Arc::new(NullGateway));
  let id = m.start_session(ChallengeMode::Streak, scope("es", Some("food"), 3)).await.unwrap();

  let mut seen = HashSet::new();
  for i in 0..3 {
    let r = m.next_word(id, turn(i, i as u32)).await.unwrap();
    let w = r.word.expect("word");
    assert_eq!(w.module_id.as_deref(), Some("food"));
    assert!(seen.insert(w.id.clone()));
    assert!(!r.ai_enhanced);
    assert_eq!(r.metadata.get("mode"), Some(&json!("streak")));

    let c = m.record_completion(id, &w.id, true, 1500, None).await.unwrap();
    assert!(c.session_continues);
    assert_eq!(c.session_completed, (i == 2).then_some(true));
  }
}

#[tokio::test]
async fn multiple_choice_options_stay_in_module() {
  let m = manager_with(Arc::new(NullGateway));
  let id = m.start_session(ChallengeMode::QuickDash, scope("es", Some("animals"), 4)).await.unwrap();
  let animals: HashSet<&str> = ["dog", "cat", "horse", "butterfly"].into_iter().collect();

  for i in 0..4 {
    let r = m.next_word(id, turn(i, 0)).await.unwrap();
    let w = r.word.unwrap();
    assert_eq!(r.quiz_mode, QuizMode::MultipleChoice);
    assert_eq!(r.options.len(), 4);
    assert!(r.options.iter().all(|o| animals.contains(o.as_str())), "{:?}", r.options);
    assert_eq!(r.options.iter().filter(|o| **o == w.definition).count(), 1);
    m.record_completion(id, &w.id, true, 800, None).await.unwrap();
  }
}

#[tokio::test]
async fn advisor_override_is_applied_and_flagged() {
  let advisor = FakeAdvisor::new(Reply::Override { word_id: "es-004", mode: "open-answer" });
  let m = manager_with(advisor.clone());
  let id = m.start_session(ChallengeMode::Streak, scope("es", Some("animals"), 5)).await.unwrap();

  let r = m.next_word(id, turn(0, 0)).await.unwrap();
  assert!(r.ai_enhanced);
  assert_eq!(r.word.unwrap().id, "es-004");
  assert_eq!(r.quiz_mode, QuizMode::OpenAnswer);
  assert!(r.options.is_empty());
  assert_eq!(r.metadata.get("reasoning"), Some(&json!(["learner keeps missing this one"])));
  assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn out_of_scope_override_falls_back() {
  let advisor = FakeAdvisor::new(Reply::Override { word_id: "es-006", mode: "open-answer" });
  let m = manager_with(advisor);
  let id = m.start_session(ChallengeMode::DeepDive, scope("es", Some("animals"), 5)).await.unwrap();

  let r = m.next_word(id, turn(0, 0)).await.unwrap();
  assert!(!r.ai_enhanced);
  assert_eq!(r.word.unwrap().module_id.as_deref(), Some("animals"));
}

#[tokio::test]
async fn failing_advisor_degrades_to_baseline() {
  let advisor = FakeAdvisor::new(Reply::Fail);
  let m = manager_with(advisor.clone());
  let id = m.start_session(ChallengeMode::FillInTheBlank, scope("zh", None, 3)).await.unwrap();

  let r = m.next_word(id, turn(0, 0)).await.unwrap();
  assert!(!r.ai_enhanced);
  assert_eq!(r.quiz_mode, QuizMode::FillInTheBlank);
  assert!(r.word.unwrap().context.is_some());
  assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_advisor_times_out_and_blocks_concurrent_turns() {
  let advisor = FakeAdvisor::new(Reply::Hang);
  let m = manager_with(advisor);
  let id = m.start_session(ChallengeMode::Streak, scope("es", None, 5)).await.unwrap();

  let (first, second) = tokio::join!(m.next_word(id, turn(0, 0)), m.next_word(id, turn(0, 0)));
  let first = first.unwrap();
  assert!(first.word.is_some());
  assert!(!first.ai_enhanced);
  assert!(matches!(second, Err(EngineError::SessionBusy { .. })));

  assert!(m.next_word(id, turn(1, 0)).await.is_ok());
}

#[tokio::test]
async fn precision_fails_until_reset() {
  let m = manager_with(Arc::new(NullGateway));
  let id = m.start_session(ChallengeMode::Precision, scope("es", None, 4)).await.unwrap();

  let r = m.next_word(id, turn(0, 0)).await.unwrap();
  let w = r.word.unwrap();
  assert!(r.metadata.contains_key("errorRisk"));
  let c = m.record_completion(id, &w.id, false, 2500, None).await.unwrap();
  assert!(!c.session_continues);
  assert_eq!(c.session_failed, Some(true));
  assert!(matches!(m.next_word(id, turn(1, 0)).await, Err(EngineError::SessionFailed)));

  m.reset_session(id).await.unwrap();
  assert!(!m.has_session_failed(id).await.unwrap());
  assert!(m.next_word(id, turn(0, 0)).await.unwrap().word.is_some());
}

#[tokio::test]
async fn boss_battle_ends_on_final_boss() {
  let m = manager_with(Arc::new(NullGateway));
  let id = m.start_session(ChallengeMode::BossBattle, scope("zh", None, 4)).await.unwrap();

  let mut phases = Vec::new();
  for i in 0..4 {
    let r = m.next_word(id, turn(i, 0)).await.unwrap();
    phases.push(r.metadata.get("bossPhase").and_then(|v| v.as_str()).unwrap_or_default().to_string());
    let w = r.word.unwrap();
    assert!(m.record_completion(id, &w.id, i != 1, 2000, None).await.unwrap().session_continues);
  }
  assert_eq!(phases.first().map(String::as_str), Some("early-boss"));
  assert_eq!(phases.last().map(String::as_str), Some("final-boss"));
}

#[tokio::test]
async fn quick_dash_stops_when_the_clock_runs_out() {
  let m = manager_with(Arc::new(NullGateway));
  let cfg = ChallengeConfig { time_limit_secs: Some(60), ..scope("es", None, 10) };
  let id = m.start_session(ChallengeMode::QuickDash, cfg).await.unwrap();

  let ctx = ChallengeContext { time_remaining_secs: Some(0.0), ..turn(3, 0) };
  let r = m.next_word(id, ctx).await.unwrap();
  assert!(r.word.is_none());
  assert!(r.options.is_empty());
  assert_eq!(r.metadata.get("timeExpired"), Some(&json!(true)));
}

#[tokio::test]
async fn sessions_are_independent() {
  let m = manager_with(Arc::new(NullGateway));
  let a = m.start_session(ChallengeMode::Precision, scope("es", None, 3)).await.unwrap();
  let b = m.start_session(ChallengeMode::Precision, scope("es", None, 3)).await.unwrap();
  assert_eq!(m.active_sessions().await, 2);

  let w = m.next_word(a, turn(0, 0)).await.unwrap().word.unwrap();
  m.record_completion(a, &w.id, false, 1000, None).await.unwrap();
  assert!(m.has_session_failed(a).await.unwrap());
  assert!(!m.has_session_failed(b).await.unwrap());

  m.end_session(a).await.unwrap();
  assert_eq!(m.active_sessions().await, 1);
}
