// Plagiarism Service
// Remote checker with provider-field normalization, or simulated placeholder results

use rand::Rng;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::models::{PlagiarismBand, PlagiarismReport, PlagiarismResult, SourceMatch};
use crate::services::providers::{Endpoint, ProviderError};
use crate::services::retry::RetryingFetchClient;

pub const EMPTY_INPUT_MESSAGE: &str = "Text to check is required";

const NO_URL: &str = "#";
const NO_SNIPPET: &str = "No snippet available";

/// Where a plagiarism check is answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Remote(Endpoint),
    /// No checker configured: random placeholder data, flagged as simulated.
    Simulated,
}

pub fn validate_input(text: &str) -> Result<(), ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::Validation(EMPTY_INPUT_MESSAGE.to_string()));
    }
    Ok(())
}

pub async fn check(
    client: &RetryingFetchClient,
    backend: &Backend,
    text: &str,
    max_sources: usize,
) -> Result<PlagiarismResult, ProviderError> {
    validate_input(text)?;

    match backend {
        Backend::Simulated => {
            warn!("[plagiarism] No checker configured, returning simulated result");
            Ok(simulate())
        }
        Backend::Remote(endpoint) => {
            info!(
                "[plagiarism] Dispatching check to {}, chars={}",
                endpoint.url,
                text.chars().count()
            );
            let response = client.call(endpoint, &json!({ "text": text })).await?;
            let result = normalize_response(&response, max_sources);
            info!(
                "[plagiarism] Check complete, score={}, sources={}",
                result.plagiarism_score,
                result.sources.len()
            );
            Ok(result)
        }
    }
}

/// A number that counts as present: finite and non-zero.
fn present_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite() && *n != 0.0)
}

fn present_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

/// `primary`, else `fraction * 100`, else 0. Zero or missing values fall through.
fn percent_field(primary: &Value, fraction: &Value) -> f64 {
    present_number(primary)
        .or_else(|| present_number(fraction).map(|f| f * 100.0))
        .unwrap_or(0.0)
}

/// Map whichever field names the provider uses onto `PlagiarismResult`.
pub fn normalize_response(response: &Value, max_sources: usize) -> PlagiarismResult {
    let plagiarism_score = percent_field(&response["percent_matched"], &response["score"]);

    let raw_sources = response["results"]
        .as_array()
        .or_else(|| response["sources"].as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    let sources = raw_sources
        .iter()
        .take(max_sources)
        .map(|source| SourceMatch {
            url: present_str(&source["url"])
                .or_else(|| present_str(&source["uri"]))
                .unwrap_or(NO_URL)
                .to_string(),
            snippet: present_str(&source["matched_text"])
                .or_else(|| present_str(&source["snippet"]))
                .unwrap_or(NO_SNIPPET)
                .to_string(),
            match_percent: percent_field(&source["percent"], &source["score"]),
        })
        .collect();

    PlagiarismResult {
        plagiarism_score,
        sources,
        simulated: false,
    }
}

pub fn simulate() -> PlagiarismResult {
    let score = rand::thread_rng().gen_range(5..=29);
    PlagiarismResult {
        plagiarism_score: f64::from(score),
        sources: vec![
            SourceMatch {
                url: "https://www.simulated-source-one.com/article/example".to_string(),
                snippet: "...this part of the text seems very similar to content found on...".to_string(),
                match_percent: 12.0,
            },
            SourceMatch {
                url: "https://www.fake-journal-entry.org/page/2".to_string(),
                snippet: "...our database found a potential match for the phrase...".to_string(),
                match_percent: 8.0,
            },
        ],
        simulated: true,
    }
}

pub fn build_report(result: PlagiarismResult) -> PlagiarismReport {
    let band = PlagiarismBand::from_score(result.plagiarism_score);
    PlagiarismReport {
        request_id: uuid::Uuid::new_v4().to_string(),
        score_display: result.plagiarism_score.round() as i64,
        band,
        band_label: band.label().to_string(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::testing::{fast_policy, rate_limited, ScriptedTransport};

    #[test]
    fn test_normalize_primary_field_names() {
        let response = json!({
            "percent_matched": 37.5,
            "results": [
                {"url": "https://a.test", "matched_text": "copied words", "percent": 20}
            ]
        });
        let result = normalize_response(&response, 5);
        assert_eq!(result.plagiarism_score, 37.5);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].url, "https://a.test");
        assert_eq!(result.sources[0].snippet, "copied words");
        assert_eq!(result.sources[0].match_percent, 20.0);
        assert!(!result.simulated);
    }

    #[test]
    fn test_normalize_fallback_field_names() {
        let response = json!({
            "score": 0.25,
            "sources": [
                {"uri": "https://b.test", "snippet": "close phrasing", "score": 0.1},
                {}
            ]
        });
        let result = normalize_response(&response, 5);
        assert_eq!(result.plagiarism_score, 25.0);
        assert_eq!(result.sources[0].url, "https://b.test");
        assert_eq!(result.sources[0].snippet, "close phrasing");
        assert!((result.sources[0].match_percent - 10.0).abs() < 1e-9);

        assert_eq!(result.sources[1].url, "#");
        assert_eq!(result.sources[1].snippet, "No snippet available");
        assert_eq!(result.sources[1].match_percent, 0.0);
    }

    #[test]
    fn test_normalize_zero_primary_falls_through() {
        let result = normalize_response(&json!({"percent_matched": 0, "score": 0.4}), 5);
        assert!((result.plagiarism_score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_empty_response() {
        let result = normalize_response(&json!({}), 5);
        assert_eq!(result.plagiarism_score, 0.0);
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_sources_truncated() {
        let sources: Vec<Value> = (0..8).map(|i| json!({"url": format!("https://s{}.test", i)})).collect();
        let result = normalize_response(&json!({"results": sources}), 5);
        assert_eq!(result.sources.len(), 5);
        assert_eq!(result.sources[4].url, "https://s4.test");
    }

    #[test]
    fn test_simulated_result() {
        for _ in 0..50 {
            let result = simulate();
            assert!(result.simulated);
            assert!((5.0..=29.0).contains(&result.plagiarism_score));
            assert_eq!(result.sources.len(), 2);
            assert_eq!(result.sources[0].match_percent, 12.0);
            assert_eq!(result.sources[1].match_percent, 8.0);
        }
    }

    #[test]
    fn test_build_report_bands() {
        let report = build_report(PlagiarismResult {
            plagiarism_score: 15.6,
            sources: vec![],
            simulated: false,
        });
        assert_eq!(report.score_display, 16);
        assert_eq!(report.band, PlagiarismBand::HighMatch);
        assert_eq!(report.band_label, "High Match");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["plagiarismScore"], 15.6);
        assert_eq!(json["bandLabel"], "High Match");
    }

    #[tokio::test]
    async fn test_remote_check_payload_and_retry() {
        let transport = ScriptedTransport::new(vec![
            rate_limited(),
            Ok(json!({"percent_matched": 9, "results": []})),
        ]);
        let client = RetryingFetchClient::new(transport.clone(), fast_policy(3));
        let backend = Backend::Remote(Endpoint::plagiarism("https://checker.test/v1/check", "k"));

        let result = check(&client, &backend, "Some essay.", 5).await.unwrap();
        assert_eq!(result.plagiarism_score, 9.0);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.payloads()[0], json!({"text": "Some essay."}));
        assert_eq!(transport.endpoints()[0].service, "Plagiarism");
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_dispatch() {
        let transport = ScriptedTransport::new(vec![]);
        let client = RetryingFetchClient::new(transport.clone(), fast_policy(3));
        let backend = Backend::Remote(Endpoint::plagiarism("https://checker.test", "k"));

        let err = check(&client, &backend, "  ", 5).await.unwrap_err();
        assert_eq!(err.user_message("Plagiarism check"), EMPTY_INPUT_MESSAGE);
        assert_eq!(transport.call_count(), 0);

        assert!(check(&client, &Backend::Simulated, "", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_simulated_backend_makes_no_calls() {
        let transport = ScriptedTransport::new(vec![]);
        let client = RetryingFetchClient::new(transport.clone(), fast_policy(3));
        let result = check(&client, &Backend::Simulated, "Essay.", 5).await.unwrap();
        assert!(result.simulated);
        assert_eq!(transport.call_count(), 0);
    }
}
