// Highlight Module
// Sentence highlighting with confidence tiers, organized leaves first:
// - sanitizer: HTML escaping and line-break conversion with token boundaries
// - matcher: literal global search for one fragment
// - annotator: tier-ordered interval claims and marker rendering
// - renderer: end-to-end raw text -> display markup

pub mod sanitizer;
pub mod matcher;
pub mod annotator;
pub mod renderer;

pub use sanitizer::{sanitize, DisplayText, LINE_BREAK};
pub use matcher::{find_all, FragmentMatcher};
pub use annotator::{annotate, claim_spans, ClaimSet, ClaimedSpan};
pub use renderer::{highlight, render, render_detection, Highlighted};
