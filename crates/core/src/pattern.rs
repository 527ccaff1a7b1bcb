// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glob matching for registry keys.
//!
//! `*` matches any run of characters except `/`, `**` matches any run
//! including `/`, and `?` matches exactly one character other than `/`.
//! Registry keys are short, so the naive recursive match is fine.

/// Match `key` against a glob `pattern`.
pub fn match_pattern(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    match_from(&p, &k)
}

fn match_from(p: &[char], k: &[char]) -> bool {
    let Some((&head, rest)) = p.split_first() else {
        return k.is_empty();
    };
    match head {
        '*' if rest.first() == Some(&'*') => {
            let rest = &rest[1..];
            (0..=k.len()).any(|i| match_from(rest, &k[i..]))
        }
        '*' => {
            // Stop extending the candidate run at the first '/'.
            let limit = k.iter().position(|&c| c == '/').unwrap_or(k.len());
            (0..=limit).any(|i| match_from(rest, &k[i..]))
        }
        '?' => k.first().is_some_and(|&c| c != '/') && match_from(rest, &k[1..]),
        c => k.first() == Some(&c) && match_from(rest, &k[1..]),
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
