// authcheck Command Layer
// Entry points for the presentation layer; every failure is a single user-facing message

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{DetectionReport, ParaphraseRequest, ParaphraseResult, ParaphraseStyle, PlagiarismReport};
use crate::services::config_store::{AppConfig, ConfigStore};
use crate::services::plagiarism::Backend;
use crate::services::providers::{
    gemini_base_url, get_api_key, plagiarism_url, Endpoint, HttpTransport, ProviderError, Transport,
};
use crate::services::retry::{RetryPolicy, RetryingFetchClient};
use crate::services::session::{Mode, Session, Submission};
use crate::services::{detector, paraphrase, plagiarism};

pub const STALE_RESULT_MESSAGE: &str = "Result discarded because a newer submission replaced it.";

/// The result currently shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outcome {
    Detection(DetectionReport),
    Paraphrase(ParaphraseResult),
    Plagiarism(PlagiarismReport),
}

pub struct Checker {
    config: AppConfig,
    client: RetryingFetchClient,
    session: Session<Outcome>,
}

impl Checker {
    /// Build a checker that talks HTTP through the configured proxy.
    pub fn from_config(config: AppConfig) -> Result<Self, String> {
        let proxy = config.proxy.as_ref().and_then(|p| p.active_url());
        let transport = HttpTransport::new(proxy)
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: AppConfig, transport: Arc<dyn Transport>) -> Self {
        let policy = RetryPolicy::from(&config.retry);
        Self {
            client: RetryingFetchClient::new(transport, policy),
            config,
            session: Session::new(),
        }
    }

    fn gemini_endpoint(&self, model: &str) -> Result<Endpoint, ProviderError> {
        let key = get_api_key("gemini", &self.config)
            .ok_or_else(|| ProviderError::MissingApiKey("gemini".to_string()))?;
        Ok(Endpoint::gemini(&gemini_base_url(&self.config), model, &key))
    }

    fn plagiarism_backend(&self) -> Backend {
        if self.config.plagiarism.simulate {
            return Backend::Simulated;
        }
        match (plagiarism_url(&self.config), get_api_key("plagiarism", &self.config)) {
            (Some(url), Some(key)) => Backend::Remote(Endpoint::plagiarism(&url, &key)),
            _ => Backend::Simulated,
        }
    }

    /// Publish a finished result, or report that it went stale while in flight.
    async fn finish<T>(
        &self,
        submission: &Submission,
        result: Result<T, ProviderError>,
        wrap: impl FnOnce(T) -> Outcome,
    ) -> Result<T, String>
    where
        T: Clone,
    {
        if !self.session.is_current(submission.ticket) {
            if let Err(e) = &result {
                warn!("[api] Dropping stale {:?} failure: {}", submission.mode, e);
            }
            return Err(STALE_RESULT_MESSAGE.to_string());
        }

        let value = result.map_err(|e| {
            warn!("[api] {:?} submission failed: {}", submission.mode, e);
            e.user_message(submission.mode.action())
        })?;

        if !self.session.publish(submission.ticket, wrap(value.clone())).await {
            return Err(STALE_RESULT_MESSAGE.to_string());
        }
        Ok(value)
    }

    /// Classify `text` and return the highlighted report.
    /// `tiered` overrides the configured prompt variant.
    pub async fn detect_text(&self, text: &str, tiered: Option<bool>) -> Result<DetectionReport, String> {
        let submission = self.session.begin(Mode::Detect, text).await;
        let tiered = tiered.unwrap_or(self.config.detection.tiered);

        let result = async {
            detector::validate_input(&submission.text)?;
            let endpoint = self.gemini_endpoint(&self.config.detection.model)?;
            let detection = detector::detect(&self.client, &endpoint, &submission.text, tiered).await?;
            Ok::<_, ProviderError>(detector::build_report(&submission.text, &detection))
        }
        .await;

        self.finish(&submission, result, Outcome::Detection).await
    }

    pub async fn paraphrase_text(&self, text: &str, style: Option<&str>) -> Result<ParaphraseResult, String> {
        let submission = self.session.begin(Mode::Paraphrase, text).await;
        let style = match style {
            Some(s) => ParaphraseStyle::parse_lenient(Some(s)),
            None => self.config.paraphrase.default_style,
        };
        let request = ParaphraseRequest {
            text_to_paraphrase: submission.text.to_string(),
            style,
        };

        let result = async {
            paraphrase::validate_request(&request)?;
            let endpoint = self.gemini_endpoint(&self.config.paraphrase.model)?;
            paraphrase::paraphrase(&self.client, &endpoint, &request).await
        }
        .await;

        self.finish(&submission, result, Outcome::Paraphrase).await
    }

    pub async fn check_plagiarism(&self, text: &str) -> Result<PlagiarismReport, String> {
        let submission = self.session.begin(Mode::Plagiarism, text).await;
        let backend = self.plagiarism_backend();

        let result = plagiarism::check(
            &self.client,
            &backend,
            &submission.text,
            self.config.plagiarism.max_sources,
        )
        .await
        .map(plagiarism::build_report);

        self.finish(&submission, result, Outcome::Plagiarism).await
    }

    /// Leaving a mode drops any in-flight result and clears the shown one.
    pub async fn switch_mode(&self, mode: Mode) {
        info!("[api] Switching to {:?}", mode);
        self.session.cancel().await;
    }

    pub async fn latest(&self) -> Option<Outcome> {
        self.session.latest().await
    }
}

/// Highlight a saved detection response against its text, without any network call.
pub fn render_saved(text: &str, response: &Value) -> Result<DetectionReport, String> {
    let result = detector::parse_detection_response(response).map_err(|e| e.user_message(Mode::Detect.action()))?;
    Ok(detector::build_report(text, &result))
}

// ============ Config commands ============

fn default_store() -> Result<ConfigStore, String> {
    ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .ok_or_else(|| "Cannot determine config directory".to_string())
}

pub fn get_config() -> Result<AppConfig, String> {
    default_store()?.load()
}

pub fn store_api_key(provider: &str, key: &str) -> Result<(), String> {
    let key = key.trim();
    if key.is_empty() {
        return Err("API key must not be empty".to_string());
    }
    default_store()?.set_api_key(provider, key)?;
    info!("[api] Stored API key for {}", provider);
    Ok(())
}

pub fn delete_api_key(provider: &str) -> Result<(), String> {
    default_store()?.delete_api_key(provider)
}

pub fn set_provider_url(provider: &str, url: &str) -> Result<(), String> {
    default_store()?.set_provider_url(provider, url.trim())
}

const REDACTED_TAIL: usize = 4;

/// Copy of `config` safe to print. Long API keys keep their last four
/// characters; anything short enough for the tail to give it away is masked whole.
pub fn redacted(config: &AppConfig) -> AppConfig {
    let mut out = config.clone();
    for key in out.api_keys.values_mut() {
        let chars: Vec<char> = key.chars().collect();
        *key = if chars.len() <= REDACTED_TAIL * 2 {
            "********".to_string()
        } else {
            let tail: String = chars[chars.len() - REDACTED_TAIL..].iter().collect();
            format!("****{}", tail)
        };
    }
    out
}
