//! AI title matcher backed by a local Ollama server.

use super::retry::{with_retry, RetryConfig};
use crate::config::AiConfig;
use crate::error::{ReelsortError, Result};
use crate::models::MediaType;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Confidence given to a result salvaged from malformed JSON.
const PARTIAL_DEFAULT_CONFIDENCE: f64 = 0.7;
/// Salvaged results never claim more than this.
const PARTIAL_MAX_CONFIDENCE: f64 = 0.8;

static PARTIAL_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""title"\s*:\s*"([^"]+)""#).unwrap());
static PARTIAL_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""year"\s*:\s*(\d{4})"#).unwrap());
static PARTIAL_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""type"\s*:\s*"(movie|tv)""#).unwrap());
static PARTIAL_CONFIDENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""confidence"\s*:\s*([\d.]+)"#).unwrap());

/// Metadata the model extracted from a filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResult {
    pub title: String,
    #[serde(default, deserialize_with = "flexible_int")]
    pub year: Option<i32>,
    /// `movie` or `tv`.
    #[serde(default, rename = "type")]
    pub media_type: String,
    #[serde(default, deserialize_with = "flexible_int")]
    pub season: Option<i32>,
    #[serde(default, deserialize_with = "flexible_episodes")]
    pub episodes: Vec<i32>,
    #[serde(default, deserialize_with = "flexible_int")]
    pub absolute_episode: Option<i32>,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl AiResult {
    /// Reject results the pipeline must not act on.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ReelsortError::AiResponse {
                message: "empty title".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ReelsortError::AiResponse {
                message: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        Ok(())
    }

    pub fn first_episode(&self) -> Option<i32> {
        self.episodes.first().copied()
    }
}

/// Models return numbers as ints, strings or null.
fn flexible_int<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i32>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Episodes arrive as `[1, 2]` or `["S01E06"]`.
fn flexible_episodes<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<i32>, D::Error> {
    let value = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(value
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            serde_json::Value::String(s) => episode_number_from_str(&s),
            _ => None,
        })
        .filter(|&n| n > 0)
        .collect())
}

fn episode_number_from_str(s: &str) -> Option<i32> {
    let upper = s.trim().to_uppercase();
    match upper.find('E') {
        Some(idx) => {
            let digits: String = upper[idx + 1..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        None => upper.parse().ok(),
    }
}

/// Remove Markdown code fences around a JSON payload.
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Salvage a result from a response that is not valid JSON.
///
/// A title is required. Confidence defaults to 0.7 and is capped at 0.8.
pub fn extract_partial_result(response: &str) -> Option<AiResult> {
    let title = PARTIAL_TITLE.captures(response)?.get(1)?.as_str().to_string();
    let confidence = PARTIAL_CONFIDENCE
        .captures(response)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map_or(PARTIAL_DEFAULT_CONFIDENCE, |c| c.min(PARTIAL_MAX_CONFIDENCE));

    Some(AiResult {
        title,
        year: PARTIAL_YEAR
            .captures(response)
            .and_then(|c| c[1].parse().ok()),
        media_type: PARTIAL_TYPE
            .captures(response)
            .map(|c| c[1].to_string())
            .unwrap_or_default(),
        season: None,
        episodes: Vec::new(),
        absolute_episode: None,
        air_date: None,
        confidence,
    })
}

/// Turn the model's text into a validated result.
pub fn parse_model_output(text: &str) -> Result<AiResult> {
    let payload = strip_code_fences(text);
    let result = match serde_json::from_str::<AiResult>(payload) {
        Ok(result) => result,
        Err(e) => extract_partial_result(payload).ok_or_else(|| ReelsortError::AiResponse {
            message: format!("unparseable model output: {}", e),
        })?,
    };
    result.validate()?;
    Ok(result)
}

/// Source of AI parses for the classification pipeline.
#[async_trait]
pub trait AiMatcher: Send + Sync {
    /// Model name, part of the cache key.
    fn model(&self) -> &str;

    /// One attempt at parsing `filename`.
    async fn parse(&self, filename: &str, media_type: MediaType) -> Result<AiResult>;

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
    }

    /// [`parse`](Self::parse) with exponential backoff on transient errors.
    async fn parse_with_retry(&self, filename: &str, media_type: MediaType) -> Result<AiResult> {
        let config = self.retry_config();
        with_retry(&config, || self.parse(filename, media_type)).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Matcher calling `POST {endpoint}/api/generate`.
pub struct OllamaMatcher {
    client: Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl OllamaMatcher {
    pub fn new(config: &AiConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(ReelsortError::Config {
                message: "AI enabled but no model specified".to_string(),
            });
        }
        if config.ollama_endpoint.trim().is_empty() {
            return Err(ReelsortError::Config {
                message: "AI enabled but no Ollama endpoint specified".to_string(),
            });
        }
        if config.timeout_seconds == 0 {
            return Err(ReelsortError::Config {
                message: "AI timeout must be at least 1 second".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("reelsort/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ReelsortError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            endpoint: config.ollama_endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout(),
            retry: RetryConfig::from_ai(config),
        })
    }

    fn prompt(filename: &str, media_type: MediaType) -> String {
        let hint = match media_type {
            MediaType::Movie => "movie",
            MediaType::Episode => "tv",
        };
        format!(
            "{}\nExpected type: {}\nNow parse this filename:\n{}",
            SYSTEM_PROMPT, hint, filename
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> ReelsortError {
        if e.is_timeout() {
            ReelsortError::Timeout(self.timeout)
        } else {
            ReelsortError::Network {
                message: format!("Ollama request failed: {}", e),
                cause: Some(e.to_string()),
            }
        }
    }
}

#[async_trait]
impl AiMatcher for OllamaMatcher {
    fn model(&self) -> &str {
        &self.model
    }

    fn retry_config(&self) -> RetryConfig {
        self.retry.clone()
    }

    async fn parse(&self, filename: &str, media_type: MediaType) -> Result<AiResult> {
        let started = Instant::now();
        let request = GenerateRequest {
            model: &self.model,
            prompt: Self::prompt(filename, media_type),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Ollama returned {}: {}", status, body.trim());
            // Server-side failures are worth retrying, rejected requests are not.
            return Err(if status.is_server_error() {
                ReelsortError::Network {
                    message,
                    cause: None,
                }
            } else {
                ReelsortError::AiResponse { message }
            });
        }

        let generated: GenerateResponse =
            response.json().await.map_err(|e| ReelsortError::AiResponse {
                message: format!("Failed to decode Ollama response: {}", e),
            })?;

        let result = parse_model_output(&generated.response)?;
        debug!(
            "AI parsed '{}' as '{}' in {:?} (confidence {:.2})",
            filename,
            result.title,
            started.elapsed(),
            result.confidence
        );
        Ok(result)
    }
}

const SYSTEM_PROMPT: &str = r#"You are a media filename parser. Extract clean metadata from messy release filenames.

Rules:
1. Remove release group tags, quality, source, codec, audio, HDR and streaming-service markers.
2. Remove edition markers such as EXTENDED, REMASTERED or Directors Cut.
3. Restore proper punctuation in titles (apostrophes, colons, commas).
4. Extract the year from anywhere in the filename, preferring the earliest.
5. For TV: extract season and episode(s), an absolute episode or an air date.
6. Return a confidence between 0.0 and 1.0. Lower it for ambiguous, generic or very short titles.

Return ONLY JSON, for example:
{"title": "The Matrix", "year": 1999, "type": "movie", "confidence": 0.98}
{"title": "Breaking Bad", "year": null, "type": "tv", "season": 1, "episodes": [1], "confidence": 0.95}"#;
