//! Unit tests for `@name` extraction.

use citadel::fanout::mentions::extract_mentions;

#[test]
fn keeps_first_seen_casing_and_drops_repeats() {
    assert_eq!(extract_mentions("hi @Bob and @bob and @Bob"), vec!["Bob"]);
}

#[test]
fn preserves_first_occurrence_order() {
    assert_eq!(
        extract_mentions("@Zed, can you and @alpha sync with @Zed?"),
        vec!["Zed", "alpha"]
    );
}

#[test]
fn accepts_digits_underscores_and_dashes() {
    assert_eq!(
        extract_mentions("cc @agent_7 @ops-lead"),
        vec!["agent_7", "ops-lead"]
    );
}

#[test]
fn email_addresses_yield_domain_token() {
    // The scanner has no word-boundary rule before `@`.
    assert_eq!(extract_mentions("mail ops@example.com"), vec!["example"]);
}

#[test]
fn no_mentions_in_plain_text() {
    assert!(extract_mentions("nothing to see here").is_empty());
    assert!(extract_mentions("").is_empty());
}

#[test]
fn non_ascii_letters_end_the_token() {
    assert_eq!(extract_mentions("@José"), vec!["Jos"]);
}
