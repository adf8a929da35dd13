//! Property-Based Tests for partsql
//!
//! These tests verify:
//! - Rendering resolves every chunk-size placeholder and is deterministic
//! - Non-positive chunk sizes are always rejected
//! - Only a literal `y`/`Y` reply confirms a fan-out

use proptest::prelude::*;

use partsql::confirm::is_affirmative;
use partsql::templates::{CHUNK_SIZE_PLACEHOLDER, render};
use partsql::{PartSqlError, RunMode, Template};

// =============================================================================
// Template rendering
// =============================================================================

/// SQL-ish fragments interleaved with placeholders
fn template_body_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-z_ ()*,=0-9]{0,12}",
            Just(CHUNK_SIZE_PLACEHOLDER.to_string()),
        ],
        0..8,
    )
    .prop_map(|parts| parts.concat())
}

fn run_mode_strategy() -> impl Strategy<Value = RunMode> {
    prop_oneof![Just(RunMode::Once), Just(RunMode::UntilZero)]
}

proptest! {
    /// render(T, c) for c > 0 leaves no placeholder behind
    #[test]
    fn render_resolves_all_placeholders(
        body in template_body_strategy(),
        mode in run_mode_strategy(),
        chunk_size in 1i64..=1_000_000,
    ) {
        let template = Template::new("t", body.clone(), mode);
        let rendered = render(&template, chunk_size).expect("positive chunk size renders");
        prop_assert!(!rendered.as_str().contains(CHUNK_SIZE_PLACEHOLDER));

        let expected = body.replace(CHUNK_SIZE_PLACEHOLDER, &chunk_size.to_string());
        prop_assert_eq!(rendered.as_str(), expected.as_str());
    }

    /// Same inputs, same output
    #[test]
    fn render_is_deterministic(body in template_body_strategy(), chunk_size in 1i64..=10_000) {
        let template = Template::new("t", body, RunMode::Once);
        let first = template.render(chunk_size).unwrap();
        let second = template.render(chunk_size).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Zero and negative chunk sizes never render
    #[test]
    fn render_rejects_non_positive(body in template_body_strategy(), chunk_size in i64::MIN..=0) {
        let template = Template::new("t", body, RunMode::UntilZero);
        match template.render(chunk_size) {
            Err(PartSqlError::InvalidChunkSize(n)) => prop_assert_eq!(n, chunk_size),
            other => prop_assert!(false, "expected InvalidChunkSize, got {:?}", other),
        }
    }
}

// =============================================================================
// Confirmation replies
// =============================================================================

proptest! {
    /// Anything that is not y/Y (ignoring the line terminator) declines
    #[test]
    fn only_y_confirms(reply in "\\PC{0,6}") {
        let trimmed = reply.trim_end_matches(['\n', '\r']);
        let expected = trimmed == "y" || trimmed == "Y";
        prop_assert_eq!(is_affirmative(&reply), expected);
    }
}
