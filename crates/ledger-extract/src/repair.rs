//! Bounded JSON repair: strip code fences, trim to the outermost braces,
//! balance braces once, then retry the parse (§4.4 step (c)).

use serde_json::Value;

/// Remove a surrounding ```` ```json ... ``` ```` or ```` ``` ... ``` ````
/// fence, if present.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches('\n');
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        rest.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Slice down to the outermost `{ ... }`, dropping any leading/trailing
/// prose the model added around the JSON object.
pub fn trim_to_braces(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &s[start..=end],
        _ => s,
    }
}

/// Append closing braces if the text has more `{` than `}`. Never removes
/// braces — a single, bounded repair, not a general JSON fixer.
pub fn balance_braces(s: &str) -> String {
    let open = s.matches('{').count();
    let close = s.matches('}').count();
    if open > close {
        format!("{s}{}", "}".repeat(open - close))
    } else {
        s.to_string()
    }
}

/// Attempt a strict parse; on failure, apply the repair passes once and
/// retry. Returns `None` if both attempts fail.
pub fn try_parse_json(raw: &str) -> Option<Value> {
    let stripped = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str(&stripped) {
        return Some(value);
    }

    let trimmed = trim_to_braces(&stripped);
    let balanced = balance_braces(trimmed);
    serde_json::from_str(&balanced).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"vendor\":\"REWE\"}\n```";
        assert_eq!(strip_code_fences(raw), "{\"vendor\":\"REWE\"}");
    }

    #[test]
    fn parses_after_stripping_prose_and_fence() {
        let raw = "Here is the receipt:\n```json\n{\"vendor\": \"REWE\", \"total\": \"45.67\"}\n```\nLet me know if you need anything else.";
        let value = try_parse_json(raw).expect("should parse");
        assert_eq!(value["vendor"], "REWE");
    }

    #[test]
    fn balances_one_missing_closing_brace() {
        let raw = "{\"vendor\": \"REWE\", \"total\": \"45.67\"";
        let value = try_parse_json(raw).expect("should parse after brace balancing");
        assert_eq!(value["total"], "45.67");
    }

    #[test]
    fn gives_up_on_unrecoverable_garbage() {
        assert!(try_parse_json("not json at all, sorry").is_none());
    }
}
