// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::match_pattern;
use yare::parameterized;

#[parameterized(
    literal = { "worker", "worker", true },
    literal_mismatch = { "worker", "workers", false },
    star_within_segment = { "worker-*", "worker-7", true },
    star_stops_at_slash = { "worker-*", "worker-7/extra", false },
    star_empty_run = { "worker-*", "worker-", true },
    double_star_crosses_slash = { "jobs/**", "jobs/emea/7", true },
    double_star_matches_empty = { "jobs/**", "jobs/", true },
    question_single_char = { "shard-?", "shard-3", true },
    question_not_slash = { "shard-?", "shard-/", false },
    question_needs_char = { "shard-?", "shard-", false },
    mixed = { "svc/*/shard-??", "svc/eu/shard-01", true },
    mixed_wrong_depth = { "svc/*/shard-??", "svc/eu/west/shard-01", false },
)]
fn globs(pattern: &str, key: &str, expected: bool) {
    assert_eq!(match_pattern(pattern, key), expected, "{pattern} vs {key}");
}

#[test]
fn empty_pattern_matches_only_empty_key() {
    assert!(match_pattern("", ""));
    assert!(!match_pattern("", "x"));
}
