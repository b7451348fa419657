// Paraphrase Service
// Human-sounding rewrites in a selectable style

use serde_json::{json, Value};
use tracing::info;

use crate::models::{ParaphraseRequest, ParaphraseResult, ParaphraseStyle};
use crate::services::providers::{extract_candidate_text, Endpoint, GenerateContentRequest, ProviderError};
use crate::services::retry::RetryingFetchClient;

pub const EMPTY_INPUT_MESSAGE: &str = "Text to paraphrase is required";

const SYSTEM_PROMPT: &str = "You are a sophisticated paraphrasing tool. Your goal is to rewrite the provided text to make it sound completely natural and human-written, significantly reducing the likelihood of it being flagged by AI detection tools.

Instructions:
- Retain the original meaning and core information.
- Vary sentence structures significantly. Avoid repetitive patterns.
- Use more natural vocabulary and phrasing. Replace overly formal or complex words with simpler, common alternatives where appropriate.
- Introduce slight variations in tone or style if it enhances naturalness, but stay true to the original intent.
- Ensure grammatical correctness and fluency.
- Critically important: Focus on eliminating patterns typical of AI-generated text (e.g., predictable transitions, overly enumerated lists, generic phrasing, excessive hedging). Aim for a style that would realistically be produced by a human.
- Do NOT add any commentary before or after the paraphrased text. Only output the paraphrased text itself.";

fn style_instruction(style: ParaphraseStyle) -> Option<&'static str> {
    match style {
        ParaphraseStyle::Default => None,
        ParaphraseStyle::Formal => Some(
            "- Style: formal. Use a polished, professional register suitable for reports or academic writing, without sounding stiff.",
        ),
        ParaphraseStyle::Casual => Some(
            "- Style: casual. Write the way a person would in a relaxed email or blog post; contractions are welcome.",
        ),
        ParaphraseStyle::Simple => Some(
            "- Style: simple. Prefer short sentences and everyday words a general reader understands on first pass.",
        ),
    }
}

pub fn system_prompt(style: ParaphraseStyle) -> String {
    match style_instruction(style) {
        Some(extra) => format!("{}\n{}", SYSTEM_PROMPT, extra),
        None => SYSTEM_PROMPT.to_string(),
    }
}

pub fn build_paraphrase_payload(request: &ParaphraseRequest) -> Value {
    // Plain text back, no schema
    GenerateContentRequest::new(
        &system_prompt(request.style),
        &request.text_to_paraphrase,
        Some(json!({})),
    )
    .to_value()
}

pub fn validate_request(request: &ParaphraseRequest) -> Result<(), ProviderError> {
    if request.text_to_paraphrase.trim().is_empty() {
        return Err(ProviderError::Validation(EMPTY_INPUT_MESSAGE.to_string()));
    }
    Ok(())
}

pub async fn paraphrase(
    client: &RetryingFetchClient,
    endpoint: &Endpoint,
    request: &ParaphraseRequest,
) -> Result<ParaphraseResult, ProviderError> {
    validate_request(request)?;

    info!(
        "[paraphrase] Dispatching rewrite, chars={}, style={}",
        request.text_to_paraphrase.chars().count(),
        request.style.as_str()
    );
    let response = client.call(endpoint, &build_paraphrase_payload(request)).await?;
    let text = extract_candidate_text(&response)?;

    Ok(ParaphraseResult {
        paraphrased_text: text.trim().to_string(),
        style: request.style,
    })
}
