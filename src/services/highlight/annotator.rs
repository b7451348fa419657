// Tier Annotator
// Claims character ranges tier by tier and renders them in one final pass

use crate::models::{Tier, TierFragments, MARK_CLOSE};
use std::ops::Range;
use tracing::debug;

use super::matcher::FragmentMatcher;
use super::sanitizer::DisplayText;

/// A byte range of the display text owned by one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedSpan {
    pub start: usize,
    pub end: usize,
    pub tier: Tier,
}

/// Sorted, non-overlapping set of claimed spans.
#[derive(Debug, Default, Clone)]
pub struct ClaimSet {
    spans: Vec<ClaimedSpan>,
}

impl ClaimSet {
    pub fn spans(&self) -> &[ClaimedSpan] {
        &self.spans
    }

    pub fn into_spans(self) -> Vec<ClaimedSpan> {
        self.spans
    }

    /// Unclaimed ranges of `[0, len)`, left to right. Empty gaps are omitted.
    pub fn gaps(&self, len: usize) -> Vec<Range<usize>> {
        let mut gaps = Vec::with_capacity(self.spans.len() + 1);
        let mut cursor = 0;
        for span in &self.spans {
            if span.start > cursor {
                gaps.push(cursor..span.start);
            }
            cursor = cursor.max(span.end);
        }
        if cursor < len {
            gaps.push(cursor..len);
        }
        gaps
    }

    /// Claims `span` unless it is empty or touches an already-claimed byte.
    pub fn try_claim(&mut self, span: ClaimedSpan) -> bool {
        if span.start >= span.end {
            return false;
        }
        let idx = self.spans.partition_point(|s| s.start < span.start);
        if idx > 0 && self.spans[idx - 1].end > span.start {
            return false;
        }
        if idx < self.spans.len() && self.spans[idx].start < span.end {
            return false;
        }
        self.spans.insert(idx, span);
        true
    }
}

/// Resolve which tier owns which range of `text`.
///
/// Tiers run in priority order (highest first) regardless of input order, and
/// fragments within a tier in the order supplied. Each fragment is searched
/// only inside ranges nobody has claimed yet, so a fragment can never land
/// inside or across an earlier marker. Matches that would cut an entity or the
/// line-break markup are dropped.
pub fn claim_spans(text: &DisplayText, tiers: &[TierFragments]) -> ClaimSet {
    let mut ordered: Vec<&TierFragments> = tiers.iter().collect();
    ordered.sort_by_key(|t| t.tier);

    let mut claims = ClaimSet::default();

    for group in ordered {
        for fragment in &group.fragments {
            let needle = DisplayText::new(fragment.trim());
            let Some(matcher) = FragmentMatcher::new(needle.as_str()) else {
                continue;
            };

            let mut claimed = 0usize;
            for gap in claims.gaps(text.len()) {
                let haystack = &text.as_str()[gap.clone()];
                for found in matcher.find_all(haystack) {
                    let start = gap.start + found.start;
                    let end = gap.start + found.end;
                    if !text.is_boundary(start) || !text.is_boundary(end) {
                        continue;
                    }
                    if claims.try_claim(ClaimedSpan { start, end, tier: group.tier }) {
                        claimed += 1;
                    }
                }
            }

            if claimed == 0 {
                debug!(
                    tier = group.tier.name(),
                    fragment_chars = fragment.chars().count(),
                    "[highlight] Fragment not found in unclaimed text"
                );
            }
        }
    }

    claims
}

/// Wrap each claimed span of `html` in its tier marker; everything else is copied as-is.
pub fn render_spans(html: &str, spans: &[ClaimedSpan]) -> String {
    let extra: usize = spans
        .iter()
        .map(|s| s.tier.open_tag().len() + MARK_CLOSE.len())
        .sum();
    let mut out = String::with_capacity(html.len() + extra);
    let mut cursor = 0;

    for span in spans {
        out.push_str(&html[cursor..span.start]);
        out.push_str(span.tier.open_tag());
        out.push_str(&html[span.start..span.end]);
        out.push_str(MARK_CLOSE);
        cursor = span.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Annotate already-sanitized display text with tier markers.
pub fn annotate(text: &DisplayText, tiers: &[TierFragments]) -> String {
    let claims = claim_spans(text, tiers);
    render_spans(text.as_str(), claims.spans())
}
