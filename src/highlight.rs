use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Builds the regex used to mark title-filter matches in the tree view.
/// The filter input is split on whitespace; longer tokens are tried first so
/// overlapping tokens resolve to the longest match.
pub fn build_filter_regex(input: &str) -> Option<Regex> {
    let mut tokens = Vec::new();
    let mut seen = HashSet::new();
    for token in input.split_whitespace() {
        if seen.insert(token.to_lowercase()) {
            tokens.push(token);
        }
    }
    if tokens.is_empty() {
        return None;
    }
    tokens.sort_by(|a, b| b.len().cmp(&a.len()));
    let pattern = tokens
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}
