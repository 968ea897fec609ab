//! Exponential backoff for AI matcher calls.
//!
//! Only transient failures (network and timeout errors) are retried; a
//! malformed model response is final on the first attempt.

use crate::config::AiConfig;
use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff settings for one matcher.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_ai(&AiConfig::default())
    }
}

impl RetryConfig {
    /// Backoff derived from the AI settings: `max_retries` attempts starting
    /// at `retry_delay`, never waiting longer than the request timeout.
    pub fn from_ai(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_delay(),
            max_delay: config.timeout().max(config.retry_delay()),
            exponential_base: 2.0,
            jitter: true,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retrying after the 0-indexed `attempt`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.exponential_base.powi(attempt as i32);
        let capped = (self.base_delay.as_secs_f64() * multiplier).min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            // Scale by 0.5..1.5 so concurrent scans do not retry in lockstep.
            let factor = rand::rng().random_range(0.5..1.5);
            (capped * factor).min(self.max_delay.as_secs_f64())
        } else {
            capped
        };
        Duration::from_secs_f64(secs)
    }
}

/// Outcome bookkeeping for one retried call.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
    pub last_error: Option<String>,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    mut operation: F,
) -> (Result<T>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut stats = RetryStats::default();
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        stats.attempts = attempt + 1;
        let error = match operation().await {
            Ok(value) => {
                stats.success = true;
                if attempt > 0 {
                    debug!("AI call succeeded after {} attempts", attempt + 1);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };
        stats.last_error = Some(error.to_string());

        if !error.is_retryable() {
            debug!("AI error is not retryable: {}", error);
            return (Err(error), stats);
        }
        if attempt + 1 >= max_attempts {
            warn!(
                "All {} AI attempts exhausted. Last error: {}",
                max_attempts, error
            );
            return (Err(error), stats);
        }

        let delay = config.calculate_delay(attempt);
        stats.total_delay += delay;
        warn!(
            "AI attempt {}/{} failed: {}. Retrying in {:?}",
            attempt + 1,
            max_attempts,
            error,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Convenience wrapper returning only the result.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async(config, operation).await.0
}

/// Error used by test doubles to simulate a dropped connection.
#[cfg(test)]
pub(crate) fn transient(message: &str) -> crate::error::ReelsortError {
    crate::error::ReelsortError::Network {
        message: message.to_string(),
        cause: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelsortError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = RetryConfig::default()
            .with_base_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(3))
            .with_jitter(false);

        assert_eq!(config.calculate_delay(0), Duration::from_millis(500));
        assert_eq!(config.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(config.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(config.calculate_delay(5), Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let config = RetryConfig::default()
            .with_base_delay(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(60));
        for _ in 0..20 {
            let delay = config.calculate_delay(0);
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
        }
    }

    #[test]
    fn test_from_ai_defaults() {
        let config = RetryConfig::from_ai(&AiConfig::default());
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let config = RetryConfig::default().with_jitter(false);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let (result, stats) = retry_async(&config, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient("connection reset"))
                } else {
                    Ok("Robots")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "Robots");
        assert_eq!(stats.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_response_is_not_retried() {
        let config = RetryConfig::default();
        let (result, stats) = retry_async(&config, || async {
            Err::<(), _>(ReelsortError::AiResponse {
                message: "empty title".into(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 1);
        assert!(!stats.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_exhausted() {
        let config = RetryConfig::default().with_max_attempts(2);
        let result: Result<()> = with_retry(&config, || async { Err(transient("down")) }).await;
        assert!(matches!(result, Err(ReelsortError::Network { .. })));
    }
}
