//! Narrowly-scoped JSON repair for LLM output.
//!
//! Models wrap JSON in code fences or chat around it. This helper lives
//! only at the adapter boundary (structured invocation, plan parsing) —
//! never in hot paths.

/// Extract the most plausible JSON document from raw model output.
///
/// Strips Markdown code fences, then trims to the outermost `{…}` or
/// `[…]` span. Returns the input unchanged when no such span exists
/// (the subsequent parse reports the real error).
pub fn extract_json(raw: &str) -> &str {
    let mut s = raw.trim();

    // ```json ... ``` or ``` ... ```
    if let Some(rest) = s.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches(['\r', '\n']);
        if let Some(end) = rest.rfind("```") {
            s = rest[..end].trim();
        } else {
            s = rest.trim();
        }
    }

    let object = outermost(s, '{', '}');
    let array = outermost(s, '[', ']');
    match (object, array) {
        (Some(o), Some(a)) => {
            // Prefer whichever opens first.
            if o.0 <= a.0 {
                &s[o.0..o.1]
            } else {
                &s[a.0..a.1]
            }
        }
        (Some(o), None) => &s[o.0..o.1],
        (None, Some(a)) => &s[a.0..a.1],
        (None, None) => s,
    }
}

fn outermost(s: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = s.find(open)?;
    let end = s.rfind(close)?;
    (end > start).then_some((start, end + close.len_utf8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_clean_json_through() {
        assert_eq!(extract_json(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"thought\": \"x\"}\n```";
        assert_eq!(extract_json(raw), "{\"thought\": \"x\"}");
    }

    #[test]
    fn trims_surrounding_chatter() {
        let raw = "Here is the plan:\n{\"title\": \"t\"}\nHope that helps!";
        assert_eq!(extract_json(raw), "{\"title\": \"t\"}");
    }

    #[test]
    fn prefers_earlier_opening_bracket() {
        let raw = r#"[1, 2, {"a": 3}]"#;
        assert_eq!(extract_json(raw), raw);
    }

    #[test]
    fn leaves_non_json_untouched() {
        assert_eq!(extract_json("no json here"), "no json here");
    }
}
