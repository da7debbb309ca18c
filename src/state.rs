//! Application state and the Session Manager.
//!
//! The manager owns one adapted mode service per session id. Each session sits
//! behind its own tokio `Mutex`; a second request against a session that is
//! already mid-turn is rejected with `SessionBusy` instead of interleaving
//! around the gateway await point.
//!
//! Sessions that go quiet for longer than the idle TTL are swept by a
//! background task, so abandoned HTTP/WS clients don't pin memory.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapter::{ChallengeService, ModeAdapter};
use crate::config::{load_engine_config_from_env, EngineConfig};
use crate::corpus::{Corpus, InMemoryCorpus};
use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, ChallengeResult, CompletionResult, Metadata};
use crate::error::{EngineError, EngineResult};
use crate::gateway::{AiGateway, NullGateway};
use crate::modes::{
  BossBattleService, DeepDiveService, FillBlankService, ModeDeps, PrecisionService, QuickDashService, StreakService,
};
use crate::openai::OpenAI;
use crate::seeds::seed_corpus;

/// One live session: the adapted service plus the config it was started with,
/// kept so a reset can bring the session straight back up.
struct SessionEntry {
  config: ChallengeConfig,
  service: Box<dyn ChallengeService>,
  last_active: Instant,
}

impl SessionEntry {
  fn touch(&mut self) {
    self.last_active = Instant::now();
  }
}

type SessionSlot = Arc<Mutex<SessionEntry>>;

pub struct SessionManager {
  sessions: RwLock<HashMap<Uuid, SessionSlot>>,
  corpus: Arc<dyn Corpus>,
  deps: ModeDeps,
  default_target_words: usize,
  idle_ttl: Option<Duration>,
}

impl SessionManager {
  pub fn new(corpus: Arc<dyn Corpus>, deps: ModeDeps, default_target_words: usize) -> Self {
    Self { sessions: RwLock::new(HashMap::new()), corpus, deps, default_target_words, idle_ttl: None }
  }

  /// Evict sessions idle for longer than `ttl` on each sweep.
  pub fn with_idle_ttl(mut self, ttl: Option<Duration>) -> Self {
    self.idle_ttl = ttl;
    self
  }

  pub fn idle_ttl(&self) -> Option<Duration> {
    self.idle_ttl
  }

  pub fn gateway_available(&self) -> bool {
    self.deps.gateway.is_available()
  }

  /// Construct the adapted service for a mode. This is the only place that
  /// branches on the mode; everything past it goes through `ChallengeService`.
  pub fn build_service(&self, mode: ChallengeMode) -> Box<dyn ChallengeService> {
    let deps = self.deps.clone();
    let corpus = self.corpus.clone();
    match mode {
      ChallengeMode::Streak => Box::new(ModeAdapter::new(StreakService::new(deps), corpus)),
      ChallengeMode::BossBattle => Box::new(ModeAdapter::new(BossBattleService::new(deps), corpus)),
      ChallengeMode::Precision => Box::new(ModeAdapter::new(PrecisionService::new(deps), corpus)),
      ChallengeMode::QuickDash => Box::new(ModeAdapter::new(QuickDashService::new(deps), corpus)),
      ChallengeMode::DeepDive => Box::new(ModeAdapter::new(DeepDiveService::new(deps), corpus)),
      ChallengeMode::FillInTheBlank => Box::new(ModeAdapter::new(FillBlankService::new(deps), corpus)),
    }
  }

  /// Fill the gaps a caller may leave: scope words from the corpus and the default target.
  fn complete_config(&self, mut config: ChallengeConfig) -> ChallengeConfig {
    if config.words.is_empty() {
      config.words = self.corpus.words_for_scope(&config.language, config.module_id.as_deref());
    }
    if config.target_words == 0 {
      config.target_words = self.default_target_words;
    }
    config
  }

  #[instrument(level = "info", target = "caatuu_engine", skip(self, config), fields(%mode, language = %config.language))]
  pub async fn start_session(&self, mode: ChallengeMode, config: ChallengeConfig) -> EngineResult<Uuid> {
    let config = self.complete_config(config);
    if config.words.is_empty() {
      return Err(EngineError::NoWordsAvailable { language: config.language, module: config.module_id });
    }

    let mut service = self.build_service(mode);
    service.initialize(config.clone()).await?;

    let id = Uuid::new_v4();
    self.sessions.write().await.insert(id, Arc::new(Mutex::new(SessionEntry { config, service, last_active: Instant::now() })));
    info!(target: "caatuu_engine", session_id = %id, %mode, "Session started");
    Ok(id)
  }

  async fn slot(&self, session_id: Uuid) -> EngineResult<SessionSlot> {
    self.sessions.read().await.get(&session_id).cloned().ok_or(EngineError::UnknownSession { session_id })
  }

  /// Look up and lock a session, refusing to wait behind an in-flight request.
  async fn with_session<T>(
    &self,
    session_id: Uuid,
    f: impl FnOnce(&mut SessionEntry) -> EngineResult<T>,
  ) -> EngineResult<T> {
    let slot = self.slot(session_id).await?;
    let mut entry = slot.try_lock().map_err(|_| busy(session_id))?;
    entry.touch();
    f(&mut entry)
  }

  #[instrument(level = "debug", target = "caatuu_engine", skip(self, ctx), fields(%session_id))]
  pub async fn next_word(&self, session_id: Uuid, mut ctx: ChallengeContext) -> EngineResult<ChallengeResult> {
    let slot = self.slot(session_id).await?;
    let mut entry = slot.try_lock().map_err(|_| busy(session_id))?;
    entry.touch();
    if ctx.language.is_empty() {
      ctx.language = entry.config.language.clone();
      ctx.module_id = entry.config.module_id.clone();
    }
    if ctx.target_words == 0 {
      ctx.target_words = entry.config.target_words;
    }
    entry.service.get_next_word(&ctx).await
  }

  pub async fn record_completion(
    &self,
    session_id: Uuid,
    word_id: &str,
    correct: bool,
    time_spent_ms: u64,
    metadata: Option<&Metadata>,
  ) -> EngineResult<CompletionResult> {
    self.with_session(session_id, |e| e.service.record_completion(word_id, correct, time_spent_ms, metadata)).await
  }

  /// Reset the mode state and bring the session back up on its original config.
  #[instrument(level = "info", target = "caatuu_engine", skip(self), fields(%session_id))]
  pub async fn reset_session(&self, session_id: Uuid) -> EngineResult<()> {
    let slot = self.slot(session_id).await?;
    let mut entry = slot.try_lock().map_err(|_| busy(session_id))?;
    entry.touch();
    entry.service.reset();
    let config = entry.config.clone();
    entry.service.initialize(config).await?;
    info!(target: "caatuu_engine", %session_id, mode = %entry.service.mode(), "Session reset");
    Ok(())
  }

  pub async fn has_session_failed(&self, session_id: Uuid) -> EngineResult<bool> {
    self.with_session(session_id, |e| Ok(e.service.has_session_failed())).await
  }

  pub async fn session_mode(&self, session_id: Uuid) -> EngineResult<ChallengeMode> {
    self.with_session(session_id, |e| Ok(e.service.mode())).await
  }

  #[instrument(level = "info", target = "caatuu_engine", skip(self), fields(%session_id))]
  pub async fn end_session(&self, session_id: Uuid) -> EngineResult<()> {
    let removed = self.sessions.write().await.remove(&session_id);
    match removed {
      Some(_) => {
        info!(target: "caatuu_engine", %session_id, "Session ended");
        Ok(())
      }
      None => Err(EngineError::UnknownSession { session_id }),
    }
  }

  pub async fn active_sessions(&self) -> usize {
    self.sessions.read().await.len()
  }

  /// Drop sessions idle past the TTL. A session mid-turn is never evicted.
  pub async fn sweep_idle(&self) -> usize {
    let Some(ttl) = self.idle_ttl else {
      return 0;
    };
    let now = Instant::now();
    let mut sessions = self.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|session_id, slot| match slot.try_lock() {
      Ok(entry) if now.duration_since(entry.last_active) >= ttl => {
        info!(target: "caatuu_engine", %session_id, mode = %entry.service.mode(), "Evicting idle session");
        false
      }
      _ => true,
    });
    let evicted = before - sessions.len();
    if evicted > 0 {
      info!(target: "caatuu_engine", evicted, remaining = sessions.len(), "Idle session sweep");
    }
    evicted
  }
}

/// Run `sweep_idle` periodically for as long as the state lives.
pub fn spawn_idle_sweeper(state: Arc<AppState>) -> Option<JoinHandle<()>> {
  let ttl = state.sessions.idle_ttl()?;
  let period = (ttl / 4).max(Duration::from_secs(1));
  Some(tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    loop {
      ticker.tick().await;
      state.sessions.sweep_idle().await;
    }
  }))
}

fn busy(session_id: Uuid) -> EngineError {
  warn!(target: "caatuu_engine", %session_id, "Rejected concurrent request on busy session");
  EngineError::SessionBusy { session_id }
}

/// Shared application state handed to the axum router.
pub struct AppState {
  pub sessions: SessionManager,
}

impl AppState {
  /// Build state from env: load config, merge the word bank into the seed
  /// corpus, and pick the OpenAI gateway when a key is present.
  #[instrument(level = "info", target = "caatuu_engine", skip_all)]
  pub fn from_env() -> Self {
    let cfg = load_engine_config_from_env();

    let gateway: Arc<dyn AiGateway> = match OpenAI::from_env(cfg.gateway.prompts.clone()) {
      Some(oa) => {
        info!(target: "caatuu_engine", base_url = %oa.base_url, model = %oa.model, "OpenAI gateway enabled.");
        Arc::new(oa)
      }
      None => {
        info!(target: "caatuu_engine", "OpenAI gateway disabled (no OPENAI_API_KEY). Using baseline selection only.");
        Arc::new(NullGateway)
      }
    };

    Self::with_gateway(&cfg, gateway)
  }

  pub fn with_gateway(cfg: &EngineConfig, gateway: Arc<dyn AiGateway>) -> Self {
    let mut corpus = seed_corpus();
    corpus.extend_from_bank(&cfg.words);
    log_inventory(&corpus);

    let deps = ModeDeps { gateway, gateway_timeout: cfg.gateway.timeout(), history_len: cfg.session.history_len() };
    let sessions =
      SessionManager::new(Arc::new(corpus), deps, cfg.session.default_target_words).with_idle_ttl(cfg.session.idle_ttl());
    Self { sessions }
  }
}

fn log_inventory(corpus: &InMemoryCorpus) {
  for (language, words) in corpus.languages() {
    info!(target: "caatuu_engine", %language, words, "Startup corpus inventory");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn manager() -> SessionManager {
    let deps = ModeDeps::new(Arc::new(NullGateway));
    SessionManager::new(Arc::new(seed_corpus()), deps, 5)
  }

  fn es() -> ChallengeConfig {
    ChallengeConfig { language: "es".into(), rng_seed: Some(11), ..Default::default() }
  }

  #[tokio::test]
  async fn start_fills_words_and_default_target() {
    let m = manager();
    let id = m.start_session(ChallengeMode::Streak, es()).await.unwrap();
    let r = m.next_word(id, ChallengeContext::default()).await.unwrap();
    assert!(r.word.is_some());
    assert_eq!(m.active_sessions().await, 1);
  }

  #[tokio::test]
  async fn unknown_language_cannot_start() {
    let m = manager();
    let cfg = ChallengeConfig { language: "xx".into(), ..Default::default() };
    assert!(matches!(m.start_session(ChallengeMode::Streak, cfg).await, Err(EngineError::NoWordsAvailable { .. })));
  }

  #[tokio::test]
  async fn unknown_and_ended_sessions_are_rejected() {
    let m = manager();
    let ghost = Uuid::new_v4();
    assert!(matches!(m.has_session_failed(ghost).await, Err(EngineError::UnknownSession { .. })));
    let id = m.start_session(ChallengeMode::DeepDive, es()).await.unwrap();
    m.end_session(id).await.unwrap();
    assert!(matches!(m.next_word(id, ChallengeContext::default()).await, Err(EngineError::UnknownSession { .. })));
    assert!(matches!(m.end_session(id).await, Err(EngineError::UnknownSession { .. })));
  }

  #[tokio::test]
  async fn locked_session_is_busy() {
    let m = manager();
    let id = m.start_session(ChallengeMode::Streak, es()).await.unwrap();
    let slot = m.slot(id).await.unwrap();
    let _held = slot.lock().await;
    assert!(matches!(m.next_word(id, ChallengeContext::default()).await, Err(EngineError::SessionBusy { .. })));
    assert!(matches!(m.record_completion(id, "es-001", true, 500, None).await, Err(EngineError::SessionBusy { .. })));
  }

  #[tokio::test]
  async fn reset_clears_precision_failure() {
    let m = manager();
    let id = m.start_session(ChallengeMode::Precision, es()).await.unwrap();
    let r = m.next_word(id, ChallengeContext::default()).await.unwrap();
    let word = r.word.unwrap();
    let c = m.record_completion(id, &word.id, false, 1000, None).await.unwrap();
    assert_eq!(c.session_failed, Some(true));
    assert!(m.has_session_failed(id).await.unwrap());
    assert!(matches!(m.next_word(id, ChallengeContext::default()).await, Err(EngineError::SessionFailed)));

    m.reset_session(id).await.unwrap();
    assert!(!m.has_session_failed(id).await.unwrap());
    assert!(m.next_word(id, ChallengeContext::default()).await.is_ok());
  }
  #[tokio::test(start_paused = true)]
  async fn idle_sessions_are_swept_and_active_ones_kept() {
    let m = manager().with_idle_ttl(Some(Duration::from_secs(60)));
    let quiet = m.start_session(ChallengeMode::Streak, es()).await.unwrap();
    let busy_one = m.start_session(ChallengeMode::Streak, es()).await.unwrap();

    tokio::time::advance(Duration::from_secs(40)).await;
    m.next_word(busy_one, ChallengeContext::default()).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;

    assert_eq!(m.sweep_idle().await, 1);
    assert_eq!(m.active_sessions().await, 1);
    assert!(matches!(m.has_session_failed(quiet).await, Err(EngineError::UnknownSession { .. })));
    assert!(m.next_word(busy_one, ChallengeContext::default()).await.is_ok());
  }

  #[tokio::test(start_paused = true)]
  async fn locked_session_survives_the_sweep() {
    let m = manager().with_idle_ttl(Some(Duration::from_secs(10)));
    let id = m.start_session(ChallengeMode::Precision, es()).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    let slot = m.slot(id).await.unwrap();
    let held = slot.lock().await;
    assert_eq!(m.sweep_idle().await, 0);
    drop(held);
    assert_eq!(m.sweep_idle().await, 1);
  }

  #[tokio::test]
  async fn sweep_is_off_without_ttl() {
    let m = manager();
    m.start_session(ChallengeMode::Streak, es()).await.unwrap();
    assert_eq!(m.sweep_idle().await, 0);
    assert_eq!(m.active_sessions().await, 1);
  }
}
