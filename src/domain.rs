//! Domain models shared by every challenge mode: vocabulary, progress records,
//! session bootstrap/turn inputs and the normalized turn outputs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rendering/answer format for a single turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizMode {
  MultipleChoice,
  LetterScramble,
  OpenAnswer,
  FillInTheBlank,
}

impl QuizMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuizMode::MultipleChoice => "multiple-choice",
      QuizMode::LetterScramble => "letter-scramble",
      QuizMode::OpenAnswer => "open-answer",
      QuizMode::FillInTheBlank => "fill-in-the-blank",
    }
  }

  /// Parse the kebab-case tag used on the wire. Unknown tags yield None.
  pub fn parse(tag: &str) -> Option<Self> {
    match tag.trim() {
      "multiple-choice" => Some(QuizMode::MultipleChoice),
      "letter-scramble" => Some(QuizMode::LetterScramble),
      "open-answer" => Some(QuizMode::OpenAnswer),
      "fill-in-the-blank" => Some(QuizMode::FillInTheBlank),
      _ => None,
    }
  }

  /// Only multiple-choice turns carry answer options.
  pub fn has_options(&self) -> bool {
    matches!(self, QuizMode::MultipleChoice)
  }
}

/// Which side of the card is shown as the prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QuizDirection {
  #[default]
  TermToDefinition,
  DefinitionToTerm,
}

/// The six practice modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeMode {
  Streak,
  BossBattle,
  Precision,
  QuickDash,
  DeepDive,
  FillInTheBlank,
}

impl ChallengeMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChallengeMode::Streak => "streak",
      ChallengeMode::BossBattle => "boss-battle",
      ChallengeMode::Precision => "precision",
      ChallengeMode::QuickDash => "quick-dash",
      ChallengeMode::DeepDive => "deep-dive",
      ChallengeMode::FillInTheBlank => "fill-in-the-blank",
    }
  }
}

impl std::fmt::Display for ChallengeMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExampleContext {
  pub sentence: String,
  #[serde(default)]
  pub translation: String,
}

/// Immutable catalog entry. Owned by the corpus; the engine only reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
  pub id: String,
  pub term: String,
  pub definition: String,
  #[serde(default)]
  pub level: Option<u8>,
  #[serde(default)]
  pub module_id: Option<String>,
  #[serde(default)]
  pub context: Option<ExampleContext>,
  #[serde(default)]
  pub preferred_direction: Option<QuizDirection>,
}

impl Word {
  pub fn direction(&self) -> QuizDirection {
    self.preferred_direction.unwrap_or_default()
  }

  /// The text a learner must produce/recognise for the given direction.
  pub fn answer_for(&self, direction: QuizDirection) -> &str {
    match direction {
      QuizDirection::TermToDefinition => &self.definition,
      QuizDirection::DefinitionToTerm => &self.term,
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionStats {
  #[serde(default)]
  pub xp: f64,
  #[serde(default)]
  pub correct_count: u32,
  #[serde(default)]
  pub incorrect_count: u32,
  #[serde(default)]
  pub streak: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionalProgress {
  #[serde(default)]
  pub term_to_definition: DirectionStats,
  #[serde(default)]
  pub definition_to_term: DirectionStats,
}

impl DirectionalProgress {
  pub fn get(&self, direction: QuizDirection) -> &DirectionStats {
    match direction {
      QuizDirection::TermToDefinition => &self.term_to_definition,
      QuizDirection::DefinitionToTerm => &self.definition_to_term,
    }
  }
}

/// Per-user, per-word mastery record. Read per call, never written by the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
  #[serde(default)]
  pub xp: f64,
  #[serde(default)]
  pub correct_count: u32,
  #[serde(default)]
  pub incorrect_count: u32,
  #[serde(default)]
  pub last_practiced: Option<DateTime<Utc>>,
  #[serde(default)]
  pub directions: Option<DirectionalProgress>,
}

impl WordProgress {
  pub fn attempts(&self) -> u32 {
    self.correct_count + self.incorrect_count
  }
}

pub type ProgressMap = HashMap<String, WordProgress>;

/// Session bootstrap parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeConfig {
  pub language: String,
  #[serde(default)]
  pub progress: ProgressMap,
  #[serde(default)]
  pub target_words: usize,
  #[serde(default)]
  pub time_limit_secs: Option<u32>,
  #[serde(default)]
  pub difficulty_seed: Option<f64>,
  #[serde(default)]
  pub module_id: Option<String>,
  #[serde(default)]
  pub words: Vec<Word>,
  /// Seeds option shuffling. Entropy-seeded when absent.
  #[serde(default)]
  pub rng_seed: Option<u64>,
}

/// Per-turn input handed in by the caller. Empty language and zero target
/// mean "use the session's own".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeContext {
  pub words_completed: usize,
  pub current_streak: u32,
  pub time_remaining_secs: Option<f64>,
  pub target_words: usize,
  pub progress: ProgressMap,
  pub language: String,
  pub module_id: Option<String>,
}

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Normalized per-turn output.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResult {
  pub word: Option<Word>,
  pub options: Vec<String>,
  pub quiz_mode: QuizMode,
  pub direction: QuizDirection,
  pub ai_enhanced: bool,
  pub metadata: Metadata,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
  pub session_continues: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_failed: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_completed: Option<bool>,
}

impl CompletionResult {
  pub fn continues() -> Self {
    Self { session_continues: true, ..Default::default() }
  }

  pub fn failed() -> Self {
    Self { session_continues: false, session_failed: Some(true), session_completed: None }
  }
}
