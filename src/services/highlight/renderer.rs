// Highlight Renderer
// Raw text + tiered fragments -> safe markup for direct display

use crate::models::{DetectionResult, Tier, TierFragments, TierSummary};

use super::annotator::{claim_spans, render_spans, ClaimedSpan};
use super::sanitizer::DisplayText;

/// Rendered markup plus the spans that produced it.
#[derive(Debug, Clone)]
pub struct Highlighted {
    pub html: String,
    pub spans: Vec<ClaimedSpan>,
}

impl Highlighted {
    pub fn count_for(&self, tier: Tier) -> usize {
        self.spans.iter().filter(|s| s.tier == tier).count()
    }
}

/// Sanitize `original`, convert its line breaks, then mark every tier's fragments.
///
/// With no tiers this is exactly sanitize + line-break conversion; there is no
/// separate plain-text path.
pub fn highlight(original: &str, tiers: &[TierFragments]) -> Highlighted {
    let text = DisplayText::new(original);
    let spans = claim_spans(&text, tiers).into_spans();
    let html = render_spans(text.as_str(), &spans);
    Highlighted { html, spans }
}

pub fn render(original: &str, tiers: &[TierFragments]) -> String {
    highlight(original, tiers).html
}

/// Highlight a classifier result against the text that was submitted.
pub fn render_detection(original: &str, result: &DetectionResult) -> (Highlighted, Vec<TierSummary>) {
    let tiers = result.tier_fragments();
    let highlighted = highlight(original, &tiers);
    let summaries = tiers
        .iter()
        .map(|t| TierSummary {
            tier: t.tier,
            fragments: t.fragments.len(),
            highlighted: highlighted.count_for(t.tier),
        })
        .collect();
    (highlighted, summaries)
}
