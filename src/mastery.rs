//! Mastery scoring: time-decayed mastery, historical accuracy and the
//! challenge score used to rank candidate words.
//!
//! All functions are pure and take `now` explicitly so callers (and tests)
//! control the clock.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{QuizDirection, Word, WordProgress};
use crate::util::term_weight;

/// Score assigned to words the learner has never seen. Unseen words are
/// "moderately challenging", not the hardest thing in the pool.
pub const UNSEEN_CHALLENGE_SCORE: f64 = 70.0;

const BASE_SCORE: f64 = 50.0;
const MASTERY_HALF_LIFE_DAYS: f64 = 14.0;
const MASTERY_DEFICIT_WEIGHT: f64 = 0.30;
const INACCURACY_WEIGHT: f64 = 20.0;
const FRAGILE_BONUS: f64 = 10.0;
const SETTLING_BONUS: f64 = 5.0;
const LENGTH_FLOOR: usize = 4;
const LENGTH_BONUS_CAP: usize = 8;
const MULTIWORD_BONUS: f64 = 2.0;

fn decay_factor(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
  match last {
    Some(ts) => {
      let days = (now - ts).num_seconds().max(0) as f64 / 86_400.0;
      0.5f64.powf(days / MASTERY_HALF_LIFE_DAYS)
    }
    None => 1.0,
  }
}

/// Current mastery on the practical 0–100 scale, decayed by time since last practice.
pub fn current_mastery(progress: &WordProgress, now: DateTime<Utc>) -> f64 {
  progress.xp.clamp(0.0, 100.0) * decay_factor(progress.last_practiced, now)
}

/// Direction-aware mastery; falls back to the aggregate when no breakdown exists.
pub fn direction_mastery(progress: &WordProgress, direction: QuizDirection, now: DateTime<Utc>) -> f64 {
  match &progress.directions {
    Some(d) => d.get(direction).xp.clamp(0.0, 100.0) * decay_factor(progress.last_practiced, now),
    None => current_mastery(progress, now),
  }
}

/// Historical accuracy in 0..=1, or None with no attempts.
pub fn accuracy(progress: &WordProgress) -> Option<f64> {
  let attempts = progress.attempts();
  if attempts == 0 {
    None
  } else {
    Some(progress.correct_count as f64 / attempts as f64)
  }
}

/// Light but nonzero history is the "still fragile" sweet spot.
fn novelty_bonus(attempts: u32) -> f64 {
  match attempts {
    1..=3 => FRAGILE_BONUS,
    4..=6 => SETTLING_BONUS,
    _ => 0.0,
  }
}

fn length_bonus(term: &str) -> f64 {
  let weight = term_weight(term);
  let mut bonus = weight.saturating_sub(LENGTH_FLOOR).min(LENGTH_BONUS_CAP) as f64;
  if term.split_whitespace().count() > 1 {
    bonus += MULTIWORD_BONUS;
  }
  bonus
}

/// How hard/valuable a word is to drill next, clamped to 0..=100.
pub fn challenge_score(word: &Word, progress: Option<&WordProgress>, now: DateTime<Utc>) -> f64 {
  let Some(p) = progress else {
    return UNSEEN_CHALLENGE_SCORE;
  };

  let mastery = direction_mastery(p, word.direction(), now);
  let mastery_deficit = (100.0 - mastery) * MASTERY_DEFICIT_WEIGHT;
  let inaccuracy = accuracy(p).map(|a| (1.0 - a) * INACCURACY_WEIGHT).unwrap_or(0.0);

  let score = BASE_SCORE + mastery_deficit + inaccuracy + novelty_bonus(p.attempts()) + length_bonus(&word.term);
  score.clamp(0.0, 100.0)
}

/// Checks the per-direction breakdown against the aggregate counters.
/// Mismatches are logged and the aggregate counters win.
pub fn check_progress_integrity(word_id: &str, progress: &WordProgress) -> bool {
  let Some(d) = &progress.directions else {
    return true;
  };
  let dir_correct = d.term_to_definition.correct_count + d.definition_to_term.correct_count;
  let dir_incorrect = d.term_to_definition.incorrect_count + d.definition_to_term.incorrect_count;
  if dir_correct != progress.correct_count || dir_incorrect != progress.incorrect_count {
    warn!(
      target: "challenge",
      %word_id,
      aggregate_correct = progress.correct_count,
      aggregate_incorrect = progress.incorrect_count,
      direction_correct = dir_correct,
      direction_incorrect = dir_incorrect,
      "Progress counters disagree with direction breakdown; using aggregate counts"
    );
    return false;
  }
  true
}
