// Retrying Fetch Client
// Bounded exponential backoff on rate-limit responses, shared by every upstream flow

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::services::config_store::RetryConfig;
use crate::services::providers::{Endpoint, ProviderError, Transport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Deadline for a single attempt. `None` waits as long as the transport does.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            attempt_timeout: (config.request_timeout_secs > 0)
                .then(|| Duration::from_secs(config.request_timeout_secs)),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): initial, 2x, 4x, ...
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

pub struct RetryingFetchClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingFetchClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// POST `payload` to `endpoint`, retrying only while the upstream reports
    /// rate limiting and the retry budget lasts. Every other failure returns
    /// immediately.
    pub async fn call(&self, endpoint: &Endpoint, payload: &Value) -> Result<Value, ProviderError> {
        let started = Instant::now();
        let mut retries: u32 = 0;

        loop {
            match self.attempt(endpoint, payload).await {
                Ok(value) => {
                    if retries > 0 {
                        info!(
                            "[retry] {} succeeded after {} retries, elapsed_ms={}",
                            endpoint.service,
                            retries,
                            started.elapsed().as_millis()
                        );
                    }
                    return Ok(value);
                }
                Err(e) if e.is_rate_limited() && retries < self.policy.max_retries => {
                    let delay = self.policy.delay_before_retry(retries);
                    warn!(
                        "[retry] {} rate limited, retrying after {}ms (attempt {}/{})",
                        endpoint.service,
                        delay.as_millis(),
                        retries + 1,
                        self.policy.max_retries
                    );
                    sleep(delay).await;
                    retries += 1;
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        warn!(
                            "[retry] {} still rate limited after {} retries, giving up",
                            endpoint.service, retries
                        );
                    } else {
                        warn!("[retry] {} failed: {}", endpoint.service, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, endpoint: &Endpoint, payload: &Value) -> Result<Value, ProviderError> {
        let fut = self.transport.post_json(endpoint, payload);
        match self.policy.attempt_timeout {
            Some(limit) => timeout(limit, fut)
                .await
                .map_err(|_| ProviderError::Timeout(limit.as_millis() as u64))?,
            None => fut.await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn endpoint() -> Endpoint {
        Endpoint::gemini("http://localhost", "model", "key")
    }

    #[test]
    fn test_delay_schedule_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            attempt_timeout: None,
        };
        assert_eq!(policy.delay_before_retry(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_before_retry(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_before_retry(2), Duration::from_millis(4000));
        // No overflow on pathological retry counts
        assert!(policy.delay_before_retry(200) >= policy.delay_before_retry(2));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));
        assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(80)));

        let no_deadline = RetryPolicy::from(&RetryConfig {
            request_timeout_secs: 0,
            ..RetryConfig::default()
        });
        assert_eq!(no_deadline.attempt_timeout, None);
    }

    #[tokio::test]
    async fn test_two_rate_limits_then_success() {
        let transport = ScriptedTransport::new(vec![
            rate_limited(),
            rate_limited(),
            Ok(json!({"ok": true})),
        ]);
        let client = RetryingFetchClient::new(transport.clone(), fast_policy(3));

        let result = client.call(&endpoint(), &json!({"text": "x"})).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
        assert_eq!(transport.call_count(), 3);

        let times = transport.call_times();
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(5));
        assert!(second_gap >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let transport = ScriptedTransport::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            Ok(json!({"never": "reached"})),
        ]);
        let client = RetryingFetchClient::new(transport.clone(), fast_policy(2));

        let err = client.call(&endpoint(), &json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_rate_limit_errors_are_not_retried() {
        for failure in [
            ProviderError::ApiError { status: 500, message: "boom".to_string() },
            ProviderError::Blocked { reason: "SAFETY".to_string() },
            ProviderError::Validation("empty".to_string()),
            ProviderError::MalformedResponse("bad".to_string()),
        ] {
            let transport = ScriptedTransport::new(vec![Err(failure), Ok(json!({}))]);
            let client = RetryingFetchClient::new(transport.clone(), fast_policy(3));
            assert!(client.call(&endpoint(), &json!({})).await.is_err());
            assert_eq!(transport.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_zero_retries_fails_on_first_rate_limit() {
        let transport = ScriptedTransport::new(vec![rate_limited(), Ok(json!({}))]);
        let client = RetryingFetchClient::new(transport.clone(), fast_policy(0));
        assert!(client.call(&endpoint(), &json!({})).await.is_err());
        assert_eq!(transport.call_count(), 1);
    }

    struct HangingTransport;

    #[async_trait]
    impl Transport for HangingTransport {
        async fn post_json(&self, _endpoint: &Endpoint, _payload: &Value) -> Result<Value, ProviderError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_hung_upstream_hits_deadline() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            attempt_timeout: Some(Duration::from_millis(20)),
        };
        let client = RetryingFetchClient::new(Arc::new(HangingTransport), policy);
        let err = client.call(&endpoint(), &json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }
}
