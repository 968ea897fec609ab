//! Wiring of index, AI helper and plan store from an [`EngineConfig`].

use anyhow::{Context, Result};
use reelsort_core::ai::{AiCache, CircuitBreakerConfig};
use reelsort_core::config::AppConfig;
use reelsort_core::{
    AiHelper, AuditActionExecutor, ClassificationPipeline, EngineConfig, MediaIndex,
    NativeTransfer, OllamaMatcher, Ownership, PlanStore, SqliteAiCache,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Default config location: `<config dir>/reelsort/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(AppConfig::APP_NAME)
        .join(AppConfig::CONFIG_FILENAME)
}

pub struct Engine {
    pub config: EngineConfig,
    pub index: Arc<MediaIndex>,
    pub ai: Option<Arc<AiHelper>>,
    pub pipeline: Arc<ClassificationPipeline>,
    pub plans: PlanStore,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self> {
        let db_path = config.paths.database_path();
        let index = Arc::new(
            MediaIndex::new(&db_path)
                .with_context(|| format!("opening media index at {}", db_path.display()))?,
        );

        let ai = if config.ai.enabled {
            let matcher = OllamaMatcher::new(&config.ai).context("configuring AI matcher")?;
            let cache: Option<Arc<dyn AiCache>> = if config.ai.cache_enabled {
                let cache_path = config.paths.ai_cache_path();
                Some(Arc::new(SqliteAiCache::new(&cache_path).with_context(|| {
                    format!("opening AI cache at {}", cache_path.display())
                })?))
            } else {
                None
            };
            info!("AI fallback enabled with model {}", config.ai.model);
            Some(Arc::new(AiHelper::new(
                Arc::new(matcher),
                cache,
                CircuitBreakerConfig::from(config.ai.circuit_breaker.clone()),
            )))
        } else {
            debug!("AI fallback disabled");
            None
        };

        let pipeline = Arc::new(ClassificationPipeline::new(&config.ai, ai.clone()));
        let plans = PlanStore::new(config.paths.plans_dir());

        Ok(Self {
            config,
            index,
            ai,
            pipeline,
            plans,
        })
    }

    pub fn executor(&self) -> Result<AuditActionExecutor> {
        let ownership =
            Ownership::resolve(&self.config.permissions).context("resolving file ownership")?;
        Ok(AuditActionExecutor::new(
            self.index.clone(),
            Arc::new(NativeTransfer::new()),
            ownership,
        ))
    }

    /// Every configured library root.
    pub fn library_roots(&self) -> Vec<PathBuf> {
        self.config
            .libraries
            .tv
            .iter()
            .chain(self.config.libraries.movies.iter())
            .cloned()
            .collect()
    }
}
