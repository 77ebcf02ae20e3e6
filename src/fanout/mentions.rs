//! `@name` mention extraction.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)] // constant pattern
static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_-]+)").expect("mention pattern compiles"));

/// Extract `@name` tokens from `content`.
///
/// A token is `@` followed by one or more ASCII letters, digits, `_`, or `-`.
/// The result keeps first-occurrence order and drops later repeats, compared
/// case-insensitively, so the first-seen casing wins.
///
/// ```
/// use citadel::fanout::mentions::extract_mentions;
///
/// assert_eq!(extract_mentions("hi @Bob and @bob and @Bob"), vec!["Bob"]);
/// ```
#[must_use]
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for token in MENTION_PATTERN
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|token| token.as_str())
    {
        if !found.iter().any(|seen| seen.eq_ignore_ascii_case(token)) {
            found.push(token.to_owned());
        }
    }
    found
}
