//! Read-only vocabulary lookup by language and module.

use std::collections::HashMap;

use tracing::warn;

use crate::config::BankWord;
use crate::domain::Word;

/// Corpus/module provider. Must return a stable ordering for a given scope.
pub trait Corpus: Send + Sync {
  fn words_for_scope(&self, language: &str, module_id: Option<&str>) -> Vec<Word>;
}

/// In-memory corpus keyed by language, preserving insertion order.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCorpus {
  by_language: HashMap<String, Vec<Word>>,
}

impl InMemoryCorpus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a word; an existing id in the same language is kept (first wins).
  pub fn insert(&mut self, language: &str, word: Word) {
    let words = self.by_language.entry(language.to_string()).or_default();
    if words.iter().any(|w| w.id == word.id) {
      warn!(target: "caatuu_engine", %language, id = %word.id, "Duplicate word id in corpus; keeping first");
      return;
    }
    words.push(word);
  }

  pub fn extend_from_bank(&mut self, bank: &[BankWord]) {
    for entry in bank {
      self.insert(&entry.language, entry.word.clone());
    }
  }

  pub fn languages(&self) -> impl Iterator<Item = (&str, usize)> {
    self.by_language.iter().map(|(k, v)| (k.as_str(), v.len()))
  }
}

impl Corpus for InMemoryCorpus {
  fn words_for_scope(&self, language: &str, module_id: Option<&str>) -> Vec<Word> {
    let Some(words) = self.by_language.get(language) else {
      return Vec::new();
    };
    match module_id {
      Some(m) => words.iter().filter(|w| w.module_id.as_deref() == Some(m)).cloned().collect(),
      None => words.clone(),
    }
  }
}
