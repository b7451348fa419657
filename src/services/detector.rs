// AI Detector Service
// Builds classifier requests, parses tiered results, produces the display report

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::models::{AiScoreBand, DetectionReport, DetectionResult};
use crate::services::highlight::render_detection;
use crate::services::providers::{
    extract_candidate_text, extract_json, Endpoint, GenerateContentRequest, ProviderError,
};
use crate::services::retry::RetryingFetchClient;

pub const EMPTY_INPUT_MESSAGE: &str = "Please enter some text to check.";

const TIERED_SYSTEM_PROMPT: &str = r#"You are an AI text detector. Analyze the following text and provide your assessment. Your response MUST be in the JSON format defined in the schema.
1.  Provide an `aiScore` (a number from 0-100)
2.  Provide a brief `justification` for the score.
3.  Most importantly: Identify the *exact sentences* from the user's text that are likely AI-generated, copied character for character. Return sentences you are highly confident about in `highConfidenceSentences` and sentences that are plausibly AI-generated in `mediumConfidenceSentences`. A sentence belongs to at most one list. If no sentences are detected, return empty arrays."#;

const LEGACY_SYSTEM_PROMPT: &str = r#"You are an AI text detector. Analyze the following text and provide your assessment. Your response MUST be in the JSON format defined in the schema.
1.  Provide an `aiScore` (a number from 0-100)
2.  Provide a brief `justification` for the score.
3.  Most importantly: Identify the *exact sentences* from the user's text that are most likely AI-generated. Return these sentences in the `aiSentences` array. Only include sentences with high confidence of being AI. If no sentences are detected, return an empty array."#;

fn sentence_list(description: &str) -> Value {
    json!({
        "type": "ARRAY",
        "items": { "type": "STRING" },
        "description": description
    })
}

fn response_schema(tiered: bool) -> Value {
    let mut properties = json!({
        "aiScore": {
            "type": "NUMBER",
            "description": "A percentage score from 0 (definitely human) to 100 (definitely AI)."
        },
        "justification": {
            "type": "STRING",
            "description": "A brief, one-sentence justification for the score."
        }
    });

    let required = if tiered {
        properties["highConfidenceSentences"] = sentence_list(
            "Exact sentences from the input text that are almost certainly AI-generated.",
        );
        properties["mediumConfidenceSentences"] = sentence_list(
            "Exact sentences from the input text that are plausibly AI-generated.",
        );
        json!(["aiScore", "justification", "highConfidenceSentences"])
    } else {
        properties["aiSentences"] = sentence_list(
            "An array of exact sentences from the input text that are most likely AI-generated.",
        );
        json!(["aiScore", "justification", "aiSentences"])
    };

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required
    })
}

/// Full generateContent payload for one detection request.
pub fn build_detection_payload(text: &str, tiered: bool) -> Value {
    let system = if tiered { TIERED_SYSTEM_PROMPT } else { LEGACY_SYSTEM_PROMPT };
    let generation_config = json!({
        "responseMimeType": "application/json",
        "responseSchema": response_schema(tiered)
    });
    GenerateContentRequest::new(system, text, Some(generation_config)).to_value()
}

/// Reject input that is empty after trimming, before anything is dispatched.
pub fn validate_input(text: &str) -> Result<(), ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::Validation(EMPTY_INPUT_MESSAGE.to_string()));
    }
    Ok(())
}

pub async fn detect(
    client: &RetryingFetchClient,
    endpoint: &Endpoint,
    text: &str,
    tiered: bool,
) -> Result<DetectionResult, ProviderError> {
    validate_input(text)?;

    info!(
        "[detector] Dispatching detection, chars={}, tiered={}",
        text.chars().count(),
        tiered
    );
    let payload = build_detection_payload(text, tiered);
    let response = client.call(endpoint, &payload).await?;
    let result = parse_detection_response(&response)?;

    info!(
        "[detector] Detection complete, aiScore={}, high={}, medium={}, legacy={}",
        result.ai_score,
        result.high_confidence_sentences.len(),
        result.medium_confidence_sentences.len(),
        result.ai_sentences.len()
    );
    Ok(result)
}

/// Parse the JSON text the model produced.
pub fn parse_detection_json(content: &str) -> Result<DetectionResult, ProviderError> {
    let json_str = extract_json(content)?;
    serde_json::from_str(json_str).map_err(|e| {
        debug!("[detector] Unparseable detection JSON: {}", content);
        ProviderError::MalformedResponse(format!("detection result: {}", e))
    })
}

/// Accept either a raw generateContent response or an already-unwrapped result.
pub fn parse_detection_response(response: &Value) -> Result<DetectionResult, ProviderError> {
    if response.get("candidates").is_some() || response.get("promptFeedback").is_some() {
        let text = extract_candidate_text(response)?;
        return parse_detection_json(&text);
    }

    serde_json::from_value(response.clone())
        .map_err(|e| ProviderError::MalformedResponse(format!("detection result: {}", e)))
}

pub fn build_report(original: &str, result: &DetectionResult) -> DetectionReport {
    let (highlighted, tiers) = render_detection(original, result);
    let band = AiScoreBand::from_score(result.ai_score);

    debug!(
        "[detector] Highlighted {} spans across {} tiers",
        highlighted.spans.len(),
        tiers.len()
    );

    DetectionReport {
        request_id: uuid::Uuid::new_v4().to_string(),
        ai_score: result.ai_score,
        score_display: result.ai_score.round() as i64,
        band,
        band_label: band.label().to_string(),
        justification: result.justification.clone(),
        highlighted_html: highlighted.html,
        tiers,
    }
}
