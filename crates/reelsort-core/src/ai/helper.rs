//! Breaker-guarded, cached access to the AI matcher.

use super::cache::{AiCache, CacheKey};
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::matcher::{AiMatcher, AiResult};
use crate::error::{ReelsortError, Result};
use crate::models::MediaType;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry point the classification pipeline uses for AI parses.
pub struct AiHelper {
    matcher: Arc<dyn AiMatcher>,
    cache: Option<Arc<dyn AiCache>>,
    breaker: CircuitBreaker,
}

impl AiHelper {
    pub fn new(
        matcher: Arc<dyn AiMatcher>,
        cache: Option<Arc<dyn AiCache>>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let breaker = CircuitBreaker::with_config(matcher.model().to_string(), breaker_config);
        Self {
            matcher,
            cache,
            breaker,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Parse `filename` with the AI matcher.
    ///
    /// Returns the result and whether it came from the cache. Fails fast with
    /// [`ReelsortError::CircuitBreakerOpen`] while the breaker is open, before
    /// the cache is consulted.
    pub async fn try_parse(
        &self,
        filename: &str,
        media_type: MediaType,
    ) -> Result<(AiResult, bool)> {
        if self.breaker.is_open() {
            return Err(ReelsortError::CircuitBreakerOpen {
                domain: self.breaker.domain().to_string(),
            });
        }

        let key = CacheKey::new(filename, media_type, self.matcher.model());
        if let Some(cache) = &self.cache {
            match cache.get(&key) {
                Ok(Some(hit)) => {
                    debug!("AI cache hit for '{}'", key.input_normalized);
                    return Ok((hit, true));
                }
                Ok(None) => {}
                Err(e) => warn!("AI cache lookup failed, calling the model: {}", e),
            }
        }

        match self.matcher.parse_with_retry(filename, media_type).await {
            Ok(result) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.put(&key, &result) {
                        warn!("Failed to cache AI result for '{}': {}", filename, e);
                    }
                }
                self.breaker.reset_failures();
                Ok((result, false))
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::ai::retry::RetryConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Matcher answering from a fixed table; unknown names fail.
    pub struct ScriptedMatcher {
        pub answers: Mutex<HashMap<String, AiResult>>,
        pub calls: AtomicU32,
        pub fail_all: bool,
    }

    impl ScriptedMatcher {
        pub fn new() -> Self {
            Self {
                answers: Mutex::new(HashMap::new()),
                calls: AtomicU32::new(0),
                fail_all: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail_all: true,
                ..Self::new()
            }
        }

        pub fn answer(self, filename: &str, title: &str, year: Option<i32>, confidence: f64) -> Self {
            self.answers.lock().unwrap().insert(
                filename.to_string(),
                AiResult {
                    title: title.to_string(),
                    year,
                    media_type: "movie".to_string(),
                    season: None,
                    episodes: Vec::new(),
                    absolute_episode: None,
                    air_date: None,
                    confidence,
                },
            );
            self
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiMatcher for ScriptedMatcher {
        fn model(&self) -> &str {
            "scripted"
        }

        fn retry_config(&self) -> RetryConfig {
            RetryConfig::default().with_max_attempts(1)
        }

        async fn parse(&self, filename: &str, _media_type: MediaType) -> Result<AiResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_all {
                return Err(crate::ai::retry::transient("model unavailable"));
            }
            self.answers
                .lock()
                .unwrap()
                .get(filename)
                .cloned()
                .ok_or_else(|| ReelsortError::AiResponse {
                    message: format!("no answer for {}", filename),
                })
        }
    }
}
