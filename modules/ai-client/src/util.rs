/// Cut `s` down to at most `max_chars` characters. Hard tail cut, no ellipsis.
pub fn truncate_to_char_boundary(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Strip a markdown code fence some models wrap JSON answers in.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let text = "1. Niñers 2. Bills";
        let cut = truncate_to_char_boundary(text, 8);
        assert_eq!(cut.chars().count(), 8);
        assert_eq!(cut, "1. Niñer");
    }

    #[test]
    fn truncate_leaves_short_input_alone() {
        assert_eq!(truncate_to_char_boundary("Chiefs", 60_000), "Chiefs");
        assert_eq!(truncate_to_char_boundary("", 3), "");
    }

    #[test]
    fn strip_fenced_json() {
        assert_eq!(strip_code_blocks("```json\n{\"rankings\":[]}\n```"), "{\"rankings\":[]}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }
}
