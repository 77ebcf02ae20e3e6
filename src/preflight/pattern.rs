//! Rule pattern normalization and evaluation.

use regex::RegexBuilder;

/// Prefixes that turn a pattern into a presence requirement, matched
/// case-insensitively after trimming.
pub const REQUIRE_PREFIXES: [&str; 4] = ["absence of ", "absence:", "absent:", "missing:"];

/// How a match is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Finding the pattern is the violation.
    Forbid,
    /// Not finding the pattern is the violation.
    Require,
}

/// A pattern with its mode prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPattern {
    /// Interpretation of a match.
    pub mode: CheckMode,
    /// Pattern text, trimmed.
    pub pattern: String,
}

/// Outcome of one pattern evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternOutcome {
    /// Whether the content satisfied the rule.
    pub passed: bool,
    /// Failure reason and, when the pattern did not compile, the regex error.
    pub details: Option<String>,
}

/// Split a raw rule pattern into mode and pattern text.
#[must_use]
pub fn normalize_pattern(raw: &str) -> NormalizedPattern {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();

    for prefix in REQUIRE_PREFIXES {
        if lower.starts_with(prefix) {
            // prefixes are ASCII, so the byte offset is a char boundary
            let rest = trimmed.get(prefix.len()..).unwrap_or_default();
            return NormalizedPattern {
                mode: CheckMode::Require,
                pattern: rest.trim().to_owned(),
            };
        }
    }

    NormalizedPattern {
        mode: CheckMode::Forbid,
        pattern: trimmed.to_owned(),
    }
}

/// Evaluate `raw_pattern` against `content`.
///
/// Matching is case-insensitive. A pattern that fails to compile falls back
/// to case-insensitive substring containment and the compile error is
/// appended to the details; evaluation itself never fails.
#[must_use]
pub fn run_pattern_check(content: &str, raw_pattern: &str) -> PatternOutcome {
    let normalized = normalize_pattern(raw_pattern);
    if normalized.pattern.is_empty() {
        return PatternOutcome {
            passed: false,
            details: Some("Empty check pattern".into()),
        };
    }

    let (matched, regex_error) = match RegexBuilder::new(&normalized.pattern)
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => (regex.is_match(content), None),
        Err(err) => (
            content
                .to_lowercase()
                .contains(&normalized.pattern.to_lowercase()),
            Some(err.to_string()),
        ),
    };

    let passed = match normalized.mode {
        CheckMode::Require => matched,
        CheckMode::Forbid => !matched,
    };

    let mut details = (!passed).then(|| match normalized.mode {
        CheckMode::Require => format!("Required pattern not found: {}", normalized.pattern),
        CheckMode::Forbid => format!("Violation found: {}", normalized.pattern),
    });
    if let Some(err) = regex_error {
        details = Some(match details {
            Some(reason) => format!("{reason}. Regex error: {err}"),
            None => format!("Regex error: {err}"),
        });
    }

    PatternOutcome { passed, details }
}
