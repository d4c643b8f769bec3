//! Tag validation and extraction

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `#tag` not preceded by a word character; `# Heading` does not match
static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w])#([A-Za-z0-9_][A-Za-z0-9_-]*)").expect("hashtag pattern is valid")
});

/// Split `incoming` into (accepted, unknown) tags
///
/// Accepted tags keep their first-seen order without duplicates. An empty
/// allow-list accepts every tag. Unknown tags are reported in the order they
/// appeared.
pub fn normalize_against_allowed<S: AsRef<str>>(
    allowed: &[String],
    incoming: &[S],
) -> (Vec<String>, Vec<String>) {
    let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut valid = Vec::new();
    let mut unknown = Vec::new();

    for tag in incoming {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if allowed.is_empty() || allowed.contains(tag) {
            if seen.insert(tag.to_string()) {
                valid.push(tag.to_string());
            }
        } else {
            unknown.push(tag.to_string());
        }
    }

    (valid, unknown)
}

/// Unique lowercase hashtags of `text` in first-seen order
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
