// authcheck Data Models
// Request-scoped values exchanged with upstream services and the presentation layer

use serde::{Deserialize, Deserializer, Serialize};

// ============ Tiers ============

/// Confidence tier attached to classifier fragments.
///
/// Declaration order is rendering priority: `High` outranks `Medium`, so
/// sorting tiers ascending yields processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
}

impl Tier {
    pub fn name(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
        }
    }

    /// Opening marker for a span owned by this tier.
    pub fn open_tag(self) -> &'static str {
        match self {
            Tier::High => r#"<mark class="ai-highlight ai-highlight-high" data-tier="high">"#,
            Tier::Medium => r#"<mark class="ai-highlight ai-highlight-medium" data-tier="medium">"#,
        }
    }
}

pub const MARK_CLOSE: &str = "</mark>";

/// Fragments the classifier attributed to one tier, in the order supplied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierFragments {
    pub tier: Tier,
    pub fragments: Vec<String>,
}

impl TierFragments {
    pub fn new(tier: Tier, fragments: Vec<String>) -> Self {
        Self { tier, fragments }
    }
}

// ============ Detection ============

/// Parsed classifier output.
///
/// Tier lists are optional upstream: absent or `null` lists deserialize as empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub ai_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub justification: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub high_confidence_sentences: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub medium_confidence_sentences: Vec<String>,
    /// Legacy single-tier list; rendered as the high tier.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub ai_sentences: Vec<String>,
}

impl DetectionResult {
    /// Non-empty tiers, highest priority first.
    pub fn tier_fragments(&self) -> Vec<TierFragments> {
        let mut high = self.high_confidence_sentences.clone();
        high.extend(self.ai_sentences.iter().cloned());

        [
            TierFragments::new(Tier::High, high),
            TierFragments::new(Tier::Medium, self.medium_confidence_sentences.clone()),
        ]
        .into_iter()
        .filter(|t| !t.fragments.is_empty())
        .collect()
    }
}

/// Display band for an AI score, matching the thresholds shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AiScoreBand {
    High,
    Medium,
    Low,
}

impl AiScoreBand {
    pub fn from_score(score: f64) -> Self {
        let rounded = score.round();
        if rounded > 75.0 {
            AiScoreBand::High
        } else if rounded > 40.0 {
            AiScoreBand::Medium
        } else {
            AiScoreBand::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AiScoreBand::High => "High Confidence",
            AiScoreBand::Medium => "Medium Confidence",
            AiScoreBand::Low => "Low Confidence",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierSummary {
    pub tier: Tier,
    pub fragments: usize,
    pub highlighted: usize,
}

/// Everything the presentation layer needs for one detection submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub request_id: String,
    pub ai_score: f64,
    pub score_display: i64,
    pub band: AiScoreBand,
    pub band_label: String,
    pub justification: String,
    pub highlighted_html: String,
    pub tiers: Vec<TierSummary>,
}

// ============ Paraphrase ============

/// Rewrite style. Unknown or missing selectors fall back to `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParaphraseStyle {
    #[default]
    Default,
    Formal,
    Casual,
    Simple,
}

impl ParaphraseStyle {
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("formal") => ParaphraseStyle::Formal,
            Some("casual") => ParaphraseStyle::Casual,
            Some("simple") => ParaphraseStyle::Simple,
            _ => ParaphraseStyle::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParaphraseStyle::Default => "default",
            ParaphraseStyle::Formal => "formal",
            ParaphraseStyle::Casual => "casual",
            ParaphraseStyle::Simple => "simple",
        }
    }
}

impl<'de> Deserialize<'de> for ParaphraseStyle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(ParaphraseStyle::parse_lenient(raw.as_ref().and_then(|v| v.as_str())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParaphraseRequest {
    pub text_to_paraphrase: String,
    #[serde(default)]
    pub style: ParaphraseStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParaphraseResult {
    pub paraphrased_text: String,
    pub style: ParaphraseStyle,
}

// ============ Plagiarism ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMatch {
    pub url: String,
    pub snippet: String,
    pub match_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismResult {
    pub plagiarism_score: f64,
    #[serde(default)]
    pub sources: Vec<SourceMatch>,
    /// Set when the result is placeholder data rather than a real check.
    #[serde(default)]
    pub simulated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlagiarismBand {
    HighMatch,
    PossibleMatch,
    LikelyOriginal,
}

impl PlagiarismBand {
    pub fn from_score(score: f64) -> Self {
        let rounded = score.round();
        if rounded > 15.0 {
            PlagiarismBand::HighMatch
        } else if rounded > 5.0 {
            PlagiarismBand::PossibleMatch
        } else {
            PlagiarismBand::LikelyOriginal
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlagiarismBand::HighMatch => "High Match",
            PlagiarismBand::PossibleMatch => "Possible Match",
            PlagiarismBand::LikelyOriginal => "Likely Original",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismReport {
    pub request_id: String,
    #[serde(flatten)]
    pub result: PlagiarismResult,
    pub score_display: i64,
    pub band: PlagiarismBand,
    pub band_label: String,
}

// ============ Helpers ============

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
