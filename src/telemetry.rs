//! Thin `tracing` instrumentation around the write path and the query path.
//! Never gates correctness — matching the house style set by the atomic
//! scan-gating counters in `byte_machine`: logging here is purely
//! observational.

use tracing::{span, Level};

pub(crate) fn add_span(rule_name: &str, key_count: usize) -> span::EnteredSpan {
    span!(
        Level::DEBUG,
        "add_pattern_rule",
        rule = rule_name,
        keys = key_count
    )
    .entered()
}

pub(crate) fn delete_span(rule_name: &str, key_count: usize) -> span::EnteredSpan {
    span!(
        Level::DEBUG,
        "delete_pattern_rule",
        rule = rule_name,
        keys = key_count
    )
    .entered()
}

pub(crate) fn query_span(field_count: usize) -> span::EnteredSpan {
    span!(Level::TRACE, "ac_finder_query", fields = field_count).entered()
}
