// Fragment Matcher
// Literal, global search for classifier-supplied sentence fragments

use regex::{Regex, RegexBuilder};
use std::ops::Range;
use tracing::warn;

/// Upper bound on the compiled size of a single fragment pattern (bytes).
/// Fragments that would exceed it are skipped instead of aborting the pass.
pub const FRAGMENT_PATTERN_SIZE_LIMIT: usize = 2 * 1024 * 1024;

/// A compiled literal pattern for one fragment.
///
/// Fragments are upstream data, never pattern syntax: every regex
/// metacharacter is escaped before compiling.
#[derive(Debug, Clone)]
pub struct FragmentMatcher {
    pattern: Regex,
}

impl FragmentMatcher {
    /// Returns `None` for an empty fragment or when the pattern cannot be built.
    pub fn new(fragment: &str) -> Option<Self> {
        Self::with_size_limit(fragment, FRAGMENT_PATTERN_SIZE_LIMIT)
    }

    pub fn with_size_limit(fragment: &str, size_limit: usize) -> Option<Self> {
        if fragment.is_empty() {
            return None;
        }

        match RegexBuilder::new(&regex::escape(fragment))
            .size_limit(size_limit)
            .build()
        {
            Ok(pattern) => Some(Self { pattern }),
            Err(e) => {
                warn!(
                    fragment_bytes = fragment.len(),
                    "[highlight] Skipping fragment, pattern build failed: {}", e
                );
                None
            }
        }
    }

    /// All non-overlapping occurrences, leftmost first.
    pub fn find_all(&self, haystack: &str) -> Vec<Range<usize>> {
        self.pattern.find_iter(haystack).map(|m| m.range()).collect()
    }
}

/// One-shot search: byte ranges of every occurrence of `fragment` in `haystack`.
/// Both must have been prepared with the same escaping rules.
pub fn find_all(haystack: &str, fragment: &str) -> Vec<Range<usize>> {
    FragmentMatcher::new(fragment)
        .map(|m| m.find_all(haystack))
        .unwrap_or_default()
}
