// Upstream Provider Service
// Generative-language (Gemini) and plagiarism endpoints behind a pluggable transport

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::config_store::AppConfig;

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("{0}")]
    Validation(String),
    #[error("Rate limited by upstream service (Status: 429): {message}")]
    RateLimited { message: String },
    #[error("{message}")]
    ApiError { status: u16, message: String },
    #[error("Request blocked: {reason}")]
    Blocked { reason: String },
    #[error("Invalid response from backend: {0}")]
    MalformedResponse(String),
    #[error("Upstream request timed out after {0}ms")]
    Timeout(u64),
    #[error("API key not configured for {0}")]
    MissingApiKey(String),
}

impl ProviderError {
    /// Whether the retry loop should back off and try again.
    ///
    /// Structured 429 status is authoritative. Message sniffing for "429" is
    /// kept only for gateways that flatten the status into the error text.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status, message } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || message.contains("429")
            }
            ProviderError::HttpError(e) => e.status() == Some(StatusCode::TOO_MANY_REQUESTS),
            _ => false,
        }
    }

    /// The single message shown to the user when a submission fails.
    /// `action` names the flow for safety blocks, e.g. "Paraphrasing".
    pub fn user_message(&self, action: &str) -> String {
        match self {
            ProviderError::Validation(msg) => msg.clone(),
            ProviderError::Blocked { reason } => {
                format!("{} blocked: {}. Try modifying the text.", action, reason)
            }
            other => format!("Failed to get result: {}. Please try again.", other),
        }
    }
}

/// How a request proves its identity to the upstream service.
#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    /// `?key=...` query parameter (generative-language API).
    QueryKey(String),
    Bearer(String),
}

/// Where a payload is sent. `service` is a short label used in logs and fallback messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub service: &'static str,
    pub url: String,
    pub auth: Auth,
}

impl Endpoint {
    pub fn gemini(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            service: "AI",
            url: format!("{}/{}:generateContent", base_url.trim_end_matches('/'), model),
            auth: Auth::QueryKey(api_key.to_string()),
        }
    }

    pub fn plagiarism(url: &str, api_key: &str) -> Self {
        Self {
            service: "Plagiarism",
            url: url.to_string(),
            auth: Auth::Bearer(api_key.to_string()),
        }
    }
}

/// One outbound POST with a JSON body, returning the parsed JSON response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, endpoint: &Endpoint, payload: &Value) -> Result<Value, ProviderError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// No client-level timeout: the per-attempt deadline lives in the retry client.
    pub fn new(proxy_url: Option<&str>) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        Ok(Self { client: builder.build()? })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, endpoint: &Endpoint, payload: &Value) -> Result<Value, ProviderError> {
        let mut request = self
            .client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .json(payload);

        request = match &endpoint.auth {
            Auth::QueryKey(key) => request.query(&[("key", key.as_str())]),
            Auth::Bearer(key) => request.bearer_auth(key),
        };

        let start = Instant::now();
        let response = request.send().await?;
        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                service = endpoint.service,
                status = status.as_u16(),
                latency_ms,
                "[providers] Upstream error body: {}",
                body
            );
            return Err(error_from_body(endpoint.service, status.as_u16(), &body));
        }

        debug!(service = endpoint.service, latency_ms, "[providers] Upstream ok");

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

/// Classify a non-2xx upstream response.
///
/// Safety blocks win over everything else; 429 becomes `RateLimited`; otherwise
/// the most specific message the body offers is kept, with a generic
/// "service failed" fallback when the body is not usable.
pub fn error_from_body(service: &str, status: u16, body: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if let Some(reason) = parsed.as_ref().and_then(block_reason) {
        return ProviderError::Blocked { reason };
    }

    let message = parsed
        .as_ref()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .or_else(|| v["message"].as_str())
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{} service failed (Status: {})", service, status));

    if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        return ProviderError::RateLimited { message };
    }

    ProviderError::ApiError { status, message }
}

fn block_reason(body: &Value) -> Option<String> {
    body["promptFeedback"]["blockReason"]
        .as_str()
        .or_else(|| body["error"]["promptFeedback"]["blockReason"].as_str())
        .map(|s| s.to_string())
}

// ============ generateContent payloads ============

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: &str) -> Self {
        Self {
            parts: vec![Part { text: text.to_string() }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
}

impl GenerateContentRequest {
    pub fn new(system: &str, user: &str, generation_config: Option<Value>) -> Self {
        Self {
            contents: vec![Content::text(user)],
            system_instruction: Content::text(system),
            generation_config,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Pull `candidates[0].content.parts[0].text` out of a generateContent response.
///
/// A withheld prompt or a candidate stopped for safety becomes `Blocked`;
/// anything else missing is a malformed response.
pub fn extract_candidate_text(response: &Value) -> Result<String, ProviderError> {
    let data: GenerateContentResponse = serde_json::from_value(response.clone())
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    if let Some(reason) = data.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::Blocked { reason });
    }

    let first = data.candidates.and_then(|c| c.into_iter().next());
    let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());

    let text = first
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.trim().is_empty());

    match (text, finish_reason) {
        (Some(text), _) => Ok(text),
        (None, Some(reason)) if reason == "SAFETY" || reason == "PROHIBITED_CONTENT" => {
            Err(ProviderError::Blocked { reason })
        }
        _ => Err(ProviderError::MalformedResponse(
            "missing candidates[0].content.parts[0].text".to_string(),
        )),
    }
}

/// Extract a JSON object from model output that may be wrapped in prose or code fences.
pub fn extract_json(content: &str) -> Result<&str, ProviderError> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed);
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&trimmed[start..=end]),
        _ => Err(ProviderError::MalformedResponse("no JSON object in model output".to_string())),
    }
}

// ============ Keys and URLs ============

/// Resolve an API key: environment first, then the loaded config.
pub fn get_api_key(provider: &str, config: &AppConfig) -> Option<String> {
    let env_keys: &[&str] = match provider {
        "gemini" => &["GEMINI_API_KEY", "AUTHCHECK_GEMINI_API_KEY"],
        "plagiarism" => &["PLAGIARISM_API_KEY", "AUTHCHECK_PLAGIARISM_API_KEY"],
        _ => &[],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    config
        .api_keys
        .get(provider)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Base URL for the generative-language API: env override, then config, then default.
pub fn gemini_base_url(config: &AppConfig) -> String {
    env::var("GEMINI_API_URL")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| config.providers.get("gemini").and_then(|p| p.base_url.clone()))
        .unwrap_or_else(|| GEMINI_DEFAULT_URL.to_string())
}

/// Plagiarism checker URL, if one is configured anywhere.
pub fn plagiarism_url(config: &AppConfig) -> Option<String> {
    env::var("PLAGIARISM_API_URL")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| config.plagiarism.endpoint.clone())
        .or_else(|| config.providers.get("plagiarism").and_then(|p| p.base_url.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gemini_endpoint_url() {
        let ep = Endpoint::gemini("https://example.test/v1beta/models/", "gemini-x", "k");
        assert_eq!(ep.url, "https://example.test/v1beta/models/gemini-x:generateContent");
        assert_eq!(ep.auth, Auth::QueryKey("k".to_string()));
    }

    #[test]
    fn test_error_from_body_prefers_upstream_message() {
        let err = error_from_body("AI", 400, r#"{"error": {"message": "API key not valid"}}"#);
        assert!(matches!(err, ProviderError::ApiError { status: 400, ref message } if message == "API key not valid"));

        let err = error_from_body("Plagiarism", 502, r#"{"message": "upstream down"}"#);
        assert_eq!(err.to_string(), "upstream down");
    }

    #[test]
    fn test_error_from_body_generic_fallback() {
        let err = error_from_body("AI", 503, "<html>Service Unavailable</html>");
        assert_eq!(err.to_string(), "AI service failed (Status: 503)");
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_error_from_body_rate_limit() {
        let err = error_from_body("AI", 429, r#"{"error": {"message": "Resource exhausted"}}"#);
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_error_from_body_safety_block() {
        let err = error_from_body("AI", 400, r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#);
        assert!(matches!(err, ProviderError::Blocked { ref reason } if reason == "SAFETY"));
        assert_eq!(
            err.user_message("Paraphrasing"),
            "Paraphrasing blocked: SAFETY. Try modifying the text."
        );
    }

    #[test]
    fn test_legacy_rate_limit_message_sniffing() {
        let err = ProviderError::ApiError {
            status: 500,
            message: "API Error: 429".to_string(),
        };
        assert!(err.is_rate_limited());
        assert!(!ProviderError::Validation("429 chars".to_string()).is_rate_limited());
    }

    #[test]
    fn test_user_messages() {
        let err = ProviderError::Validation("Please enter some text to check.".to_string());
        assert_eq!(err.user_message("Detection"), "Please enter some text to check.");

        let err = ProviderError::MalformedResponse("missing field".to_string());
        assert_eq!(
            err.user_message("Detection"),
            "Failed to get result: Invalid response from backend: missing field. Please try again."
        );
    }

    #[test]
    fn test_request_payload_shape() {
        let payload = GenerateContentRequest::new("sys", "user text", Some(json!({"temperature": 0.7})))
            .to_value();
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "user text");
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(payload["generationConfig"]["temperature"], 0.7);

        let bare = GenerateContentRequest::new("sys", "u", None).to_value();
        assert!(bare.get("generationConfig").is_none());
    }

    #[test]
    fn test_extract_candidate_text() {
        let response = json!({"candidates": [{"content": {"parts": [{"text": "hello"}]}}]});
        assert_eq!(extract_candidate_text(&response).unwrap(), "hello");
    }

    #[test]
    fn test_extract_candidate_text_blocked() {
        let response = json!({"promptFeedback": {"blockReason": "OTHER"}});
        assert!(matches!(
            extract_candidate_text(&response),
            Err(ProviderError::Blocked { ref reason }) if reason == "OTHER"
        ));

        let response = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert!(matches!(extract_candidate_text(&response), Err(ProviderError::Blocked { .. })));
    }

    #[test]
    fn test_extract_candidate_text_malformed() {
        for response in [json!({}), json!({"candidates": []}), json!({"candidates": [{"content": {"parts": [{}]}}]})] {
            assert!(matches!(
                extract_candidate_text(&response),
                Err(ProviderError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json(" {\"a\": 1} ").unwrap(), "{\"a\": 1}");
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```").unwrap(), "{\"a\": 1}");
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = AppConfig::default();
        config.api_keys.insert("unit-test-provider".to_string(), " key ".to_string());
        assert_eq!(get_api_key("unit-test-provider", &config).as_deref(), Some("key"));
        assert_eq!(get_api_key("absent-provider", &config), None);
    }
}
