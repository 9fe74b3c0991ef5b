//! Identity and memoization for engine instances.
//!
//! Engines are expensive to set up, so the registry hands out one instance
//! per `(engine type, profile URL)` for the lifetime of the process. The
//! cache is backed by `moka`, whose get-or-insert is single-flight: under a
//! concurrent first-access race exactly one construction runs and every
//! caller observes the same instance.

use std::collections::HashMap;
use std::sync::Arc;

use moka::future::Cache;
use tracing::info;

use crate::embedded::EmbeddedReferenceEngine;
use crate::engine::{EngineType, ValidationEngine};
use crate::error::Result;
use crate::fetch::{FetchConfig, HttpResourceFetcher, ResourceFetcher};
use crate::local::LocalRuleEngine;
use crate::remote::{RemoteApiConfig, RemoteApiEngine};

/// Composite cache key. Reference-resource URL maps are deliberately NOT
/// part of the key: two requests for the same type and profile URL receive
/// the identical engine even when their maps differ - the first build wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineKey {
    pub engine_type: EngineType,
    pub profile_url: String,
}

impl EngineKey {
    pub fn new(engine_type: EngineType, profile_url: impl Into<String>) -> Self {
        Self {
            engine_type,
            profile_url: profile_url.into(),
        }
    }
}

/// Registry of memoized engine instances.
pub struct EngineRegistry {
    engines: Cache<EngineKey, Arc<dyn ValidationEngine>>,
    fetcher: Arc<dyn ResourceFetcher>,
    remote_client: reqwest::Client,
    remote_config: RemoteApiConfig,
}

/// Upper bound on distinct (type, profile URL) pairs held at once; far above
/// anything a deployment uses, present so the cache has a defined capacity.
const MAX_CACHED_ENGINES: u64 = 256;

impl EngineRegistry {
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default(), RemoteApiConfig::default())
    }

    pub fn with_config(fetch_config: FetchConfig, remote_config: RemoteApiConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpResourceFetcher::new(fetch_config)?);
        Self::with_fetcher(fetcher, remote_config)
    }

    /// Build a registry around an injected fetcher; tests use this to hand
    /// local engines canned or failing fetch behavior.
    pub fn with_fetcher(
        fetcher: Arc<dyn ResourceFetcher>,
        remote_config: RemoteApiConfig,
    ) -> Result<Self> {
        let remote_client = remote_config.build_client()?;
        Ok(Self {
            engines: Cache::new(MAX_CACHED_ENGINES),
            fetcher,
            remote_client,
            remote_config,
        })
    }

    /// Create-or-reuse the engine for `(engine_type, profile_url)`.
    ///
    /// The URL maps only matter for the first construction of a local rule
    /// engine under a given key; later calls reuse the cached instance
    /// silently.
    pub async fn get_or_create(
        &self,
        engine_type: EngineType,
        profile_url: &str,
        structure_definition_urls: &HashMap<String, String>,
        code_system_urls: &HashMap<String, String>,
        value_set_urls: &HashMap<String, String>,
    ) -> Arc<dyn ValidationEngine> {
        let key = EngineKey::new(engine_type, profile_url);
        self.engines
            .get_with(key, async {
                info!(engine = %engine_type, profile_url, "constructing validation engine");
                match engine_type {
                    EngineType::LocalRule => Arc::new(LocalRuleEngine::new(
                        profile_url,
                        structure_definition_urls.clone(),
                        code_system_urls.clone(),
                        value_set_urls.clone(),
                        Arc::clone(&self.fetcher),
                    )) as Arc<dyn ValidationEngine>,
                    EngineType::EmbeddedReference => {
                        Arc::new(EmbeddedReferenceEngine::new(profile_url))
                    }
                    EngineType::RemoteApi => Arc::new(RemoteApiEngine::new(
                        profile_url,
                        self.remote_client.clone(),
                        self.remote_config.clone(),
                    )),
                }
            })
            .await
    }

    /// Number of engine instances currently memoized. Flushes the cache's
    /// pending maintenance first so the count is exact.
    pub async fn cached_engine_count(&self) -> u64 {
        self.engines.run_pending_tasks().await;
        self.engines.entry_count()
    }
}
