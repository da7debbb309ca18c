//! Built-in vocabulary that guarantees the engine is useful without external
//! config: a small Spanish and Chinese set split into modules.

use crate::corpus::InMemoryCorpus;
use crate::domain::{ExampleContext, QuizDirection, Word};

fn w(id: &str, term: &str, definition: &str, level: u8, module: &str) -> Word {
  Word {
    id: id.into(),
    term: term.into(),
    definition: definition.into(),
    level: Some(level),
    module_id: Some(module.into()),
    context: None,
    preferred_direction: None,
  }
}

fn with_context(mut word: Word, sentence: &str, translation: &str) -> Word {
  word.context = Some(ExampleContext { sentence: sentence.into(), translation: translation.into() });
  word
}

pub fn seed_words_es() -> Vec<Word> {
  vec![
    with_context(w("es-001", "perro", "dog", 1, "animals"), "El perro duerme en el sofá.", "The dog sleeps on the sofa."),
    with_context(w("es-002", "gato", "cat", 1, "animals"), "Mi gato come pescado.", "My cat eats fish."),
    w("es-003", "caballo", "horse", 2, "animals"),
    w("es-004", "mariposa", "butterfly", 2, "animals"),
    with_context(w("es-005", "manzana", "apple", 1, "food"), "Quiero una manzana roja.", "I want a red apple."),
    w("es-006", "pan", "bread", 1, "food"),
    with_context(w("es-007", "queso", "cheese", 1, "food"), "El queso es de Francia.", "The cheese is from France."),
    w("es-008", "zanahoria", "carrot", 2, "food"),
    w("es-009", "desayuno", "breakfast", 2, "food"),
    with_context(w("es-010", "aeropuerto", "airport", 3, "travel"), "Llegamos al aeropuerto temprano.", "We arrived at the airport early."),
    w("es-011", "billete de ida y vuelta", "round-trip ticket", 4, "travel"),
    Word {
      preferred_direction: Some(QuizDirection::DefinitionToTerm),
      ..w("es-012", "equipaje", "luggage", 3, "travel")
    },
  ]
}

pub fn seed_words_zh() -> Vec<Word> {
  vec![
    with_context(w("zh-001", "咖啡", "coffee", 1, "hsk1"), "我想喝咖啡。", "I want to drink coffee."),
    with_context(w("zh-002", "天气", "weather", 1, "hsk1"), "今天天气很好。", "The weather is great today."),
    w("zh-003", "老师", "teacher", 1, "hsk1"),
    w("zh-004", "学习", "to study", 1, "hsk1"),
    w("zh-005", "北京", "Beijing", 1, "hsk1"),
    with_context(w("zh-006", "计划", "plan", 3, "hsk3"), "我们计划明天去北京。", "We plan to go to Beijing tomorrow."),
    w("zh-007", "虽然", "although", 3, "hsk3"),
    w("zh-008", "环境", "environment", 3, "hsk3"),
  ]
}

pub fn seed_corpus() -> InMemoryCorpus {
  let mut corpus = InMemoryCorpus::new();
  for word in seed_words_es() {
    corpus.insert("es", word);
  }
  for word in seed_words_zh() {
    corpus.insert("zh", word);
  }
  corpus
}
