//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe preview of user or model text: first `max` chars, char-boundary safe.
pub fn preview(s: &str, max: usize) -> String {
  let mut chars = s.chars();
  let head: String = chars.by_ref().take(max).collect();
  if chars.next().is_some() { format!("{head}…") } else { head }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x then y");
  }

  #[test]
  fn fill_template_leaves_unknown_keys() {
    assert_eq!(fill_template("{missing}", &[("a", "x")]), "{missing}");
  }

  #[test]
  fn preview_truncates_on_char_boundaries() {
    assert_eq!(preview("héllo wörld", 5), "héllo…");
    assert_eq!(preview("short", 10), "short");
  }
}
