//! Combined-prompt construction and sampling-parameter derivation
//! (spec.md §4.2, §6).

use crate::priority::Priority;

/// Exact wire-format template (spec.md §6). `{style}` and `{questions}` are
/// substituted; everything else is reproduced literally.
const TEMPLATE: &str = "{style}\n\n\
Answer each question below. You MUST return ONLY a valid JSON array with no other text.\n\n\
CRITICAL FORMATTING RULES:\n\
1. Return ONLY the JSON array - no markdown, no code blocks, no explanations\n\
2. Each array element must have \"index\" (number) and \"response\" (string)\n\
3. Escape all special characters in your responses (quotes, newlines, etc.)\n\
4. Keep responses as single-line strings (replace actual newlines with \\n)\n\
5. Do not include any text before or after the JSON array\n\n\
Example format (follow this EXACTLY):\n\
[{\"index\": 0, \"response\": \"Your answer here\"}, {\"index\": 1, \"response\": \"Another answer\"}]\n\n\
Questions:\n\
{questions}\n\n\
Remember: Return ONLY the JSON array, nothing else.";

/// Build the single combined prompt multiplexing `prompts.len()` questions.
///
/// `request_ids[i]` labels question `i` in the numbered questions block so a
/// human reading the upstream log can see which client asked what, even
/// though the authoritative mapping back to the client is positional, not
/// the `request_id` text (spec.md §3 invariants).
pub fn build_combined_prompt(priority: Priority, prompts: &[String], request_ids: &[String]) -> String {
    let questions = prompts
        .iter()
        .enumerate()
        .map(|(i, prompt)| format!("Index {i} (request_id: {}): {prompt}", request_ids[i]))
        .collect::<Vec<_>>()
        .join("\n");

    TEMPLATE
        .replace("{style}", priority.style_directive())
        .replace("{questions}", &questions)
}

/// Upstream output-token budget for a batch of `n` prompts at `priority`.
/// The 1.5x factor and +500 absorb JSON overhead and reduce truncation
/// (spec.md §4.2); capped at the upstream's hard ceiling.
pub fn output_token_budget(priority_max_tokens: u32, n: usize) -> u32 {
    let scaled = (priority_max_tokens as f64 * n as f64 * 1.5).ceil() as u64 + 500;
    scaled.min(32_768) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_contains_style_and_questions() {
        let prompt = build_combined_prompt(
            Priority::High,
            &["What time is it?".to_string()],
            &["req-1".to_string()],
        );
        assert!(prompt.starts_with("very brief, 1-3 sentences each"));
        assert!(prompt.contains("Index 0 (request_id: req-1): What time is it?"));
        assert!(prompt.contains("Return ONLY the JSON array"));
        assert!(prompt.ends_with("Remember: Return ONLY the JSON array, nothing else."));
    }

    #[test]
    fn multiple_questions_are_numbered_in_order() {
        let prompts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ids = vec!["r0".to_string(), "r1".to_string(), "r2".to_string()];
        let prompt = build_combined_prompt(Priority::Low, &prompts, &ids);
        assert!(prompt.contains("Index 0 (request_id: r0): a"));
        assert!(prompt.contains("Index 1 (request_id: r1): b"));
        assert!(prompt.contains("Index 2 (request_id: r2): c"));
    }

    #[test]
    fn token_budget_applies_factor_and_floor() {
        // 512 * 1 * 1.5 + 500 = 1268
        assert_eq!(output_token_budget(512, 1), 1268);
        // 512 * 6 * 1.5 + 500 = 5108
        assert_eq!(output_token_budget(512, 6), 5108);
    }

    #[test]
    fn token_budget_is_capped() {
        assert_eq!(output_token_budget(2048, 100), 32_768);
    }
}
