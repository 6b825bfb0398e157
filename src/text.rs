//! Text helpers shared by the intent classifier, the request-criteria deriver
//! and the step actions.

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Whether any keyword of the set appears in the (already lower-cased) text.
pub(crate) fn contains_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| lower.contains(kw))
}

/// Count how many keywords of the set appear in the (already lower-cased) text.
///
/// Each keyword counts at most once, however often it repeats.
pub(crate) fn count_matches(lower: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| lower.contains(*kw)).count()
}
