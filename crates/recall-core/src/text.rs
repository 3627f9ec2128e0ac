//! String utilities shared by prompts and envelopes.
//!
//! Truncation is UTF-8–safe: `&str[..n]` panics when `n` falls inside a
//! multi-byte character, so these helpers snap to the nearest char boundary.

/// Longest prefix of `s` whose byte length is ≤ `max_bytes`, never splitting
/// a multi-byte character.
#[inline]
#[must_use]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate `s` and append `suffix` when the original exceeds `max_bytes`.
///
/// The result is at most `max_bytes` bytes including the suffix; a string
/// that already fits is returned unchanged.
#[must_use]
pub fn truncate_with_suffix(s: &str, max_bytes: usize, suffix: &str) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let body = truncate_str(s, max_bytes.saturating_sub(suffix.len()));
    format!("{body}{suffix}")
}

/// Strip a single triple-backtick fence (with optional `json` tag) wrapping
/// the payload, if present.
///
/// Completion services routinely wrap strict-JSON answers in markdown
/// fences; synthesis strips them before parsing.
#[must_use]
pub fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed,
    };
    match body.rfind("```") {
        Some(idx) => body[..idx].trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── truncate_str ─────────────────────────────────────────────────────

    #[test]
    fn ascii_within_limit() {
        assert_eq!(truncate_str("query", 10), "query");
    }

    #[test]
    fn ascii_truncated() {
        assert_eq!(truncate_str("retrieve context", 8), "retrieve");
    }

    #[test]
    fn multibyte_boundary_snaps_back() {
        // '图' is 3 bytes; cutting inside it must not panic
        let s = "意图分析";
        assert_eq!(truncate_str(s, 4), "意");
        assert_eq!(truncate_str(s, 6), "意图");
    }

    #[test]
    fn zero_budget() {
        assert_eq!(truncate_str("abc", 0), "");
    }

    // ── truncate_with_suffix ─────────────────────────────────────────────

    #[test]
    fn suffix_applied_when_over() {
        assert_eq!(truncate_with_suffix("hello world", 8, "..."), "hello...");
    }

    #[test]
    fn suffix_skipped_when_fits() {
        assert_eq!(truncate_with_suffix("hello", 8, "..."), "hello");
    }

    #[test]
    fn suffix_with_multibyte_body() {
        let s = "解决方案要点整理完毕";
        let out = truncate_with_suffix(s, 10, "...");
        assert!(out.len() <= 10);
        assert!(out.ends_with("..."));
    }

    // ── strip_code_fences ────────────────────────────────────────────────

    #[test]
    fn strips_json_fence() {
        let s = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(s), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let s = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(s), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_passthrough() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn unterminated_fence_left_alone() {
        let s = "```json\n{\"a\": 1}";
        assert_eq!(strip_code_fences(s), s);
    }

    #[test]
    fn fence_with_surrounding_prose_keeps_inner_payload() {
        let s = "```json\n{\"ok\": true}\n```";
        let out = strip_code_fences(s);
        assert!(serde_json::from_str::<serde_json::Value>(out).is_ok());
    }
}
