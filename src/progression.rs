//! Difficulty progression curves per mode, plus the reactive error-risk model
//! used by Precision mode.
//!
//! Curves are generated once at initialize and never change for the session.

use crate::domain::QuizMode;

pub const DEFAULT_STREAK_START: f64 = 30.0;
const STREAK_SPAN: f64 = 50.0;
const STREAK_CEILING: f64 = 90.0;
const STREAK_BONUS_PER_HIT: f64 = 2.0;
const STREAK_BONUS_CAP: f64 = 15.0;

/// Fraction of the way through a session of `n` turns at turn `i`.
fn turn_fraction(i: usize, n: usize) -> f64 {
  if n <= 1 {
    1.0
  } else {
    i as f64 / (n - 1) as f64
  }
}

fn linear(n: usize, from: f64, to: f64) -> Vec<f64> {
  (0..n).map(|i| from + (to - from) * turn_fraction(i, n)).collect()
}

/// Boss Battle: 40→60 over the first 30% of turns, 60→80 over the middle 40%,
/// 80→95 over the final 30%.
pub fn boss_battle_curve(target_words: usize) -> Vec<f64> {
  (0..target_words)
    .map(|i| {
      let f = turn_fraction(i, target_words);
      if f < 0.3 {
        40.0 + (f / 0.3) * 20.0
      } else if f < 0.7 {
        60.0 + ((f - 0.3) / 0.4) * 20.0
      } else {
        80.0 + ((f - 0.7) / 0.3) * 15.0
      }
    })
    .collect()
}

pub fn streak_curve(target_words: usize, seed: Option<f64>) -> Vec<f64> {
  let start = seed.unwrap_or(DEFAULT_STREAK_START).clamp(0.0, 100.0);
  let end = (start + STREAK_SPAN).min(STREAK_CEILING).max(start);
  linear(target_words, start, end)
}

/// Live streak bonus layered on top of the streak curve.
pub fn streak_bonus(current_streak: u32) -> f64 {
  (current_streak as f64 * STREAK_BONUS_PER_HIT).min(STREAK_BONUS_CAP)
}

pub fn deep_dive_curve(target_words: usize) -> Vec<f64> {
  linear(target_words, 35.0, 65.0)
}

pub fn fill_blank_curve(target_words: usize) -> Vec<f64> {
  linear(target_words, 40.0, 75.0)
}

/// Quick Dash is time-driven: difficulty rises with the share of the clock spent.
pub fn quick_dash_difficulty(time_remaining_secs: Option<f64>, time_limit_secs: Option<u32>) -> f64 {
  let elapsed = match (time_remaining_secs, time_limit_secs) {
    (Some(remaining), Some(limit)) if limit > 0 => 1.0 - (remaining / limit as f64),
    _ => 0.0,
  };
  30.0 + 50.0 * elapsed.clamp(0.0, 1.0)
}

/// Curve lookup clamped to the last entry once the session runs past its target.
pub fn curve_at(curve: &[f64], words_completed: usize) -> f64 {
  match curve.last() {
    Some(last) => curve.get(words_completed).copied().unwrap_or(*last),
    None => 50.0,
  }
}

fn mode_risk_weight(mode: QuizMode) -> f64 {
  match mode {
    QuizMode::MultipleChoice => 0.0,
    QuizMode::FillInTheBlank => 0.1,
    QuizMode::LetterScramble => 0.1,
    QuizMode::OpenAnswer => 0.2,
  }
}

/// Probability-like risk of the learner erring on the next turn, in 0..=1.
/// Later turns carry more risk (there is more to lose), as do past errors,
/// hesitant answers and harder formats.
pub fn error_risk(words_completed: usize, target_words: usize, error_count: u32, hesitations: u32, mode: QuizMode) -> f64 {
  let progress = if target_words == 0 {
    0.0
  } else {
    (words_completed as f64 / target_words as f64).min(1.0)
  };
  let hesitation = (hesitations as f64 * 0.1).min(0.2);
  (0.4 * progress + 0.5 * error_count as f64 + hesitation + mode_risk_weight(mode)).clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
  Easy,
  Medium,
  Hard,
}

impl RiskBand {
  pub fn from_risk(risk: f64) -> Self {
    if risk > 0.5 {
      RiskBand::Easy
    } else if risk > 0.3 {
      RiskBand::Medium
    } else {
      RiskBand::Hard
    }
  }

  pub fn difficulty(&self) -> f64 {
    match self {
      RiskBand::Easy => 25.0,
      RiskBand::Medium => 50.0,
      RiskBand::Hard => 70.0,
    }
  }
}
