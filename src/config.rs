//! Loading engine configuration (gateway prompts, session tuning and an
//! optional word bank) from TOML.
//!
//! See `EngineConfig` for the expected schema.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::Word;

pub const MIN_HISTORY_LEN: usize = 4;
pub const MAX_HISTORY_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file: {0}")]
  Io(#[from] std::io::Error),
  #[error("failed to parse TOML config: {0}")]
  Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineConfig {
  #[serde(default)]
  pub gateway: GatewaySettings,
  #[serde(default)]
  pub session: SessionSettings,
  /// Extra vocabulary merged into the built-in seed corpus.
  #[serde(default)]
  pub words: Vec<BankWord>,
}

/// Word bank entry: a catalog word tagged with its language.
#[derive(Clone, Debug, Deserialize)]
pub struct BankWord {
  pub language: String,
  #[serde(flatten)]
  pub word: Word,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GatewaySettings {
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  #[serde(default)]
  pub prompts: Prompts,
}

fn default_timeout_ms() -> u64 {
  4000
}

impl Default for GatewaySettings {
  fn default() -> Self {
    Self { timeout_ms: default_timeout_ms(), prompts: Prompts::default() }
  }
}

impl GatewaySettings {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionSettings {
  #[serde(default = "default_history_len")]
  pub history_len: usize,
  #[serde(default = "default_target_words")]
  pub default_target_words: usize,
  /// Seconds a session may sit idle before it is swept. 0 disables the sweep.
  #[serde(default = "default_idle_ttl_secs")]
  pub idle_ttl_secs: u64,
}

fn default_history_len() -> usize {
  6
}

fn default_target_words() -> usize {
  10
}

fn default_idle_ttl_secs() -> u64 {
  1800
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self {
      history_len: default_history_len(),
      default_target_words: default_target_words(),
      idle_ttl_secs: default_idle_ttl_secs(),
    }
  }
}

impl SessionSettings {
  /// History ring size, kept within the supported 4..=8 window.
  pub fn history_len(&self) -> usize {
    self.history_len.clamp(MIN_HISTORY_LEN, MAX_HISTORY_LEN)
  }

  pub fn idle_ttl(&self) -> Option<Duration> {
    (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
  }
}

/// Prompts used by the OpenAI gateway. Override them in TOML to tune the advisor.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub enhance_system: String,
  pub enhance_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      enhance_system: "You are a vocabulary drill coach. Decide whether the planned turn should change. Respond ONLY with strict JSON.".into(),
      enhance_user_template: "Mode: {mode}\nPlanned word: {word_json}\nPlanned quiz mode: {quiz_mode}\nLearner progress: {progress_json}\nSession: {context_json}\n\nReturn JSON {\"interventionNeeded\": boolean, \"selectedWordId\": string|null, \"aiRecommendedMode\": \"multiple-choice\"|\"letter-scramble\"|\"open-answer\"|\"fill-in-the-blank\"|null, \"reasoning\": [string]}. Only pick selectedWordId from candidateIds. Intervene rarely.".into(),
    }
  }
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
  let s = std::fs::read_to_string(path)?;
  Ok(toml::from_str::<EngineConfig>(&s)?)
}

/// Attempt to load `EngineConfig` from ENGINE_CONFIG_PATH. On any error, returns defaults.
pub fn load_engine_config_from_env() -> EngineConfig {
  let Ok(path) = std::env::var("ENGINE_CONFIG_PATH") else {
    return EngineConfig::default();
  };
  match load_engine_config(Path::new(&path)) {
    Ok(cfg) => {
      info!(target: "caatuu_engine", %path, bank_words = cfg.words.len(), "Loaded engine config (TOML)");
      cfg
    }
    Err(e) => {
      error!(target: "caatuu_engine", %path, error = %e, "Failed to load engine config; using defaults");
      EngineConfig::default()
    }
  }
}
