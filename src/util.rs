//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// True if unicode char belongs to CJK ranges.
pub fn is_cjk(ch: char) -> bool {
  ('\u{4E00}'..='\u{9FFF}').contains(&ch)
    || ('\u{3400}'..='\u{4DBF}').contains(&ch)
    || ('\u{20000}'..='\u{2A6DF}').contains(&ch)
    || ('\u{2A700}'..='\u{2B73F}').contains(&ch)
    || ('\u{2B740}'..='\u{2B81F}').contains(&ch)
    || ('\u{2B820}'..='\u{2CEAF}').contains(&ch)
    || ('\u{F900}'..='\u{FAFF}').contains(&ch)
}

/// Visual length of a term: a Han character carries roughly as much
/// information as a short alphabetic syllable, so it counts double.
pub fn term_weight(term: &str) -> usize {
  term
    .chars()
    .filter(|c| !c.is_whitespace())
    .map(|c| if is_cjk(c) { 2 } else { 1 })
    .sum()
}

/// Log-safe truncation for large strings (char-boundary aware).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_all_keys() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn han_characters_weigh_double() {
    assert_eq!(term_weight("猫"), 2);
    assert_eq!(term_weight("cat"), 3);
    assert_eq!(term_weight("ice cream"), 8);
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "今天天气很好";
    let t = trunc_for_log(s, 2);
    assert!(t.starts_with("今天…"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
