//! AI fallback for titles the regex and folder stages cannot read.
//!
//! [`AiHelper`] wraps an [`AiMatcher`] with a [`CircuitBreaker`] and an
//! optional [`AiCache`]. The breaker is owned by the helper so independent
//! helpers (and tests) never share failure state.

mod cache;
mod circuit_breaker;
mod helper;
mod matcher;
mod retry;

pub use cache::{normalize_for_cache, AiCache, CacheKey, MemoryAiCache, SqliteAiCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use helper::AiHelper;
pub use matcher::{
    extract_partial_result, parse_model_output, strip_code_fences, AiMatcher, AiResult,
    OllamaMatcher,
};
pub use retry::{retry_async, with_retry, RetryConfig, RetryStats};

#[cfg(test)]
pub(crate) use helper::test_support;
