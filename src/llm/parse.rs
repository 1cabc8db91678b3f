//! Robust recovery of the upstream's JSON-array reply (spec.md §4.2).
//!
//! The upstream is a stochastic LLM that will, non-trivially often, wrap its
//! reply in prose or code fences, or truncate it mid-string. No single
//! failure mode is treated as terminal — each strategy below is tried in
//! turn, and the pipeline stops at the first one that yields a parseable
//! JSON array. If nothing parses, a manual-extraction fallback scrapes
//! whatever structure it can find.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Parse the upstream's raw reply text into an `index -> response` map.
/// Indices outside `[0, n)` are silently dropped; duplicate indices are
/// resolved last-write-wins, matching JSON-array iteration order.
pub fn parse_batch_reply(raw: &str, n: usize) -> HashMap<usize, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return HashMap::new();
    }

    let fence_stripped = strip_code_fence(trimmed).unwrap_or_else(|| trimmed.to_string());
    if let Some(items) = try_parse_array(&fence_stripped, n) {
        return items;
    }

    let bracketed = extract_bracketed_array(&fence_stripped).unwrap_or_else(|| fence_stripped.clone());
    if let Some(items) = try_parse_array(&bracketed, n) {
        return items;
    }

    let decommaed = remove_trailing_commas(&bracketed);
    if let Some(items) = try_parse_array(&decommaed, n) {
        return items;
    }

    let repaired = fix_truncation(&decommaed);
    if let Some(items) = try_parse_array(&repaired, n) {
        return items;
    }

    warn!(
        raw_preview = %preview(raw),
        "failed to parse upstream batch reply as JSON; falling back to manual extraction"
    );
    manual_extraction_fallback(raw, n)
}

fn preview(s: &str) -> String {
    s.chars().take(500).collect()
}

/// Strip a single surrounding code fence (` ```json ` or ` ``` `) if present.
fn strip_code_fence(s: &str) -> Option<String> {
    let re = Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("static regex");
    re.captures(s).map(|c| c[1].to_string())
}

/// Extract the first `[{ ... }]`-shaped substring, tolerating stray prose
/// before or after it.
fn extract_bracketed_array(s: &str) -> Option<String> {
    let re = Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").expect("static regex");
    re.find(s).map(|m| m.as_str().to_string())
}

/// Remove trailing commas before a closing `]` or `}`.
fn remove_trailing_commas(s: &str) -> String {
    let re = Regex::new(r",\s*([\]}])").expect("static regex");
    re.replace_all(s, "$1").to_string()
}

/// If the payload doesn't end in `]`, assume it was truncated mid-stream and
/// close it: an unterminated string first, then an unterminated object, then
/// the array itself.
fn fix_truncation(s: &str) -> String {
    let trimmed = s.trim_end();
    if trimmed.ends_with(']') {
        return trimmed.to_string();
    }

    let mut repaired = trimmed.to_string();
    if count_unescaped_quotes(&repaired) % 2 == 1 {
        repaired.push('"');
    }
    if brace_depth(&repaired) > 0 {
        repaired.push('}');
    }
    repaired.push(']');
    repaired
}

fn count_unescaped_quotes(s: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for ch in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => count += 1,
            _ => {}
        }
    }
    count
}

fn brace_depth(s: &str) -> i64 {
    let mut depth = 0i64;
    for ch in s.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    depth.max(0)
}

/// Attempt to parse `s` as a JSON array of `{"index", "response"}` objects.
/// Returns `None` if it isn't valid JSON, or isn't an array at all —
/// distinct from "valid JSON array with some elements skipped," which is a
/// normal, successful outcome.
fn try_parse_array(s: &str, n: usize) -> Option<HashMap<usize, String>> {
    let value: Value = serde_json::from_str(s).ok()?;
    let array = value.as_array()?;

    let mut out = HashMap::new();
    for element in array {
        let Some(obj) = element.as_object() else {
            continue;
        };
        let Some(index) = obj.get("index").and_then(coerce_index) else {
            warn!("skipping batch reply element missing a usable \"index\"");
            continue;
        };
        let Some(response) = obj.get("response").and_then(coerce_text) else {
            warn!(index, "skipping batch reply element missing a usable \"response\"");
            continue;
        };
        if index < n {
            out.insert(index, response.trim().to_string());
        }
    }
    Some(out)
}

fn coerce_index(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

fn coerce_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// When nothing parses as JSON at all: regex-scrape `{"index":N,"response":"..."}`
/// fragments, tolerating escape sequences inside the response text. If that
/// finds nothing, fall back further to line-oriented `Index N: text` blocks.
fn manual_extraction_fallback(raw: &str, n: usize) -> HashMap<usize, String> {
    let fragment_re =
        Regex::new(r#"(?s)"index"\s*:\s*(\d+)\s*,\s*"response"\s*:\s*"((?:\\.|[^"\\])*)""#)
            .expect("static regex");

    let mut out = HashMap::new();
    for caps in fragment_re.captures_iter(raw) {
        let Ok(index) = caps[1].parse::<usize>() else {
            continue;
        };
        if index < n {
            out.insert(index, unescape(&caps[2]));
        }
    }
    if !out.is_empty() {
        return out;
    }

    let line_re = Regex::new(r"(?s)Index\s+(\d+)\s*:\s*(.*?)(?=Index\s+\d+\s*:|\z)")
        .expect("static regex");
    for caps in line_re.captures_iter(raw) {
        let Ok(index) = caps[1].parse::<usize>() else {
            continue;
        };
        if index < n {
            out.insert(index, caps[2].trim().to_string());
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_array_parses_directly() {
        let reply = r#"[{"index": 0, "response": "a"}, {"index": 1, "response": "b"}]"#;
        let parsed = parse_batch_reply(reply, 2);
        assert_eq!(parsed.get(&0), Some(&"a".to_string()));
        assert_eq!(parsed.get(&1), Some(&"b".to_string()));
    }

    #[test]
    fn strips_code_fence() {
        let reply = "```json\n[{\"index\": 0, \"response\": \"a\"}]\n```";
        let parsed = parse_batch_reply(reply, 1);
        assert_eq!(parsed.get(&0), Some(&"a".to_string()));
    }

    #[test]
    fn extracts_array_wrapped_in_prose() {
        let reply = "here you go: [{\"index\":0,\"response\":\"a\"},{\"index\":2,\"response\":\"c\"}] hope that helps";
        let parsed = parse_batch_reply(reply, 3);
        assert_eq!(parsed.get(&0), Some(&"a".to_string()));
        assert_eq!(parsed.get(&2), Some(&"c".to_string()));
        assert_eq!(parsed.get(&1), None);
    }

    #[test]
    fn malformed_reply_scenario_from_spec() {
        // spec.md §8 scenario 6
        let reply = "here you go: ```json\n[{\"index\":0,\"response\":\"a\"},{\"index\":2,\"response\":\"c\"}]```";
        let parsed = parse_batch_reply(reply, 3);
        assert_eq!(parsed.get(&0), Some(&"a".to_string()));
        assert_eq!(parsed.get(&2), Some(&"c".to_string()));
        assert!(!parsed.contains_key(&1));
    }

    #[test]
    fn removes_trailing_commas() {
        let reply = r#"[{"index": 0, "response": "a"},]"#;
        let parsed = parse_batch_reply(reply, 1);
        assert_eq!(parsed.get(&0), Some(&"a".to_string()));
    }

    #[test]
    fn repairs_truncated_string_and_object() {
        let reply = r#"[{"index": 0, "response": "a"}, {"index": 1, "response": "truncated"#;
        let parsed = parse_batch_reply(reply, 2);
        assert_eq!(parsed.get(&0), Some(&"a".to_string()));
        assert_eq!(parsed.get(&1), Some(&"truncated".to_string()));
    }

    #[test]
    fn out_of_range_indices_are_dropped() {
        let reply = r#"[{"index": 0, "response": "a"}, {"index": 5, "response": "out of range"}]"#;
        let parsed = parse_batch_reply(reply, 2);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get(&0), Some(&"a".to_string()));
    }

    #[test]
    fn duplicate_indices_last_write_wins() {
        let reply = r#"[{"index": 0, "response": "first"}, {"index": 0, "response": "second"}]"#;
        let parsed = parse_batch_reply(reply, 1);
        assert_eq!(parsed.get(&0), Some(&"second".to_string()));
    }

    #[test]
    fn manual_fallback_scrapes_index_response_fragments() {
        let reply = "total garbage but somewhere in here \"index\": 0, \"response\": \"rescued\\nvalue\" and more noise";
        let parsed = parse_batch_reply(reply, 1);
        assert_eq!(parsed.get(&0), Some(&"rescued\nvalue".to_string()));
    }

    #[test]
    fn manual_fallback_line_oriented() {
        let reply = "Index 0: first answer\nIndex 1: second answer\nIndex 2: third answer";
        let parsed = parse_batch_reply(reply, 3);
        assert_eq!(parsed.get(&0), Some(&"first answer".to_string()));
        assert_eq!(parsed.get(&1), Some(&"second answer".to_string()));
        assert_eq!(parsed.get(&2), Some(&"third answer".to_string()));
    }

    #[test]
    fn empty_reply_yields_empty_map() {
        assert!(parse_batch_reply("", 3).is_empty());
    }
}
