//! Candidate selection: rank the scoped pool by challenge score and pick from
//! a difficulty-proportional window of that ranking.
//!
//! Ranking is a stable sort, so equal scores keep corpus order and results are
//! reproducible. Exhaustion is recovered here:
//!   1) tiered window minus exclusions
//!   2) whole pool minus exclusions
//!   3) globally highest-scoring word (reuse)

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{ProgressMap, Word};
use crate::mastery::challenge_score;

const WINDOW_FRACTION: f64 = 0.4;

/// A scored candidate, borrowing the word from the pool.
#[derive(Clone, Copy, Debug)]
pub struct Ranked<'a> {
  pub word: &'a Word,
  pub score: f64,
}

/// Score every word and sort hardest-first (stable).
pub fn rank_pool<'a>(pool: &'a [Word], progress: &ProgressMap, now: DateTime<Utc>) -> Vec<Ranked<'a>> {
  let mut ranked: Vec<Ranked<'a>> = pool
    .iter()
    .map(|w| Ranked { word: w, score: challenge_score(w, progress.get(&w.id), now) })
    .collect();
  ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
  ranked
}

/// Rank range `[start, end)` for a difficulty in 0..=100 over `n` ranked words.
pub fn tier_window(n: usize, difficulty: f64) -> (usize, usize) {
  if n == 0 {
    return (0, 0);
  }
  let width = ((n as f64 * WINDOW_FRACTION).ceil() as usize).clamp(1, n);
  let d = difficulty.clamp(0.0, 100.0) / 100.0;
  let start = ((1.0 - d) * (n - width) as f64).round() as usize;
  (start, (start + width).min(n))
}

/// Pick the next word for a difficulty tier. Returns None only for an empty pool.
pub fn select_word(
  pool: &[Word],
  progress: &ProgressMap,
  difficulty: f64,
  exclude: &HashSet<String>,
) -> Option<Word> {
  select_word_at(pool, progress, difficulty, exclude, Utc::now())
}

pub fn select_word_at(
  pool: &[Word],
  progress: &ProgressMap,
  difficulty: f64,
  exclude: &HashSet<String>,
  now: DateTime<Utc>,
) -> Option<Word> {
  let ranked = rank_pool(pool, progress, now);
  let (start, end) = tier_window(ranked.len(), difficulty);

  if let Some(r) = ranked[start..end].iter().find(|r| !exclude.contains(&r.word.id)) {
    return Some(r.word.clone());
  }

  if let Some(r) = ranked.iter().find(|r| !exclude.contains(&r.word.id)) {
    debug!(target: "selection", difficulty, start, end, "Tier window exhausted; widened to unused pool");
    return Some(r.word.clone());
  }

  let top = ranked.first()?;
  debug!(target: "selection", pool = ranked.len(), word_id = %top.word.id, "Pool exhausted; reusing highest-scoring word");
  Some(top.word.clone())
}

/// Hardest word not yet used, ignoring tiers. Falls back to the hardest overall.
pub fn select_hardest_unused(pool: &[Word], progress: &ProgressMap, exclude: &HashSet<String>) -> Option<Word> {
  let ranked = rank_pool(pool, progress, Utc::now());
  ranked
    .iter()
    .find(|r| !exclude.contains(&r.word.id))
    .or_else(|| ranked.first())
    .map(|r| r.word.clone())
}
