//! Top-level entry point: runs sessions and retains their history.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::error::Result;
use crate::fetch::{FetchConfig, ResourceFetcher};
use crate::registry::EngineRegistry;
use crate::remote::RemoteApiConfig;
use crate::session::{Session, SessionBuilder};

/// Owns the engine registry and the history of orchestrated sessions.
///
/// ```no_run
/// use validate_fhir::Orchestrator;
///
/// # async fn example() -> validate_fhir::Result<()> {
/// let orchestrator = Orchestrator::new()?;
///
/// let session = orchestrator
///     .session()
///     .with_profile_url("http://example.com/profiles/submission-bundle")
///     .with_payload(r#"{"resourceType": "Bundle", "type": "collection"}"#)
///     .add_local_rule_engine()
///     .await
///     .add_embedded_engine()
///     .await
///     .build();
///
/// orchestrator.orchestrate([session]).await;
///
/// for session in orchestrator.sessions() {
///     for result in session.results() {
///         println!("valid: {}", result.is_valid());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    registry: EngineRegistry,
    sessions: RwLock<Vec<Arc<Session>>>,
}

impl Orchestrator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            registry: EngineRegistry::new()?,
            sessions: RwLock::new(Vec::new()),
        })
    }

    pub fn with_config(fetch_config: FetchConfig, remote_config: RemoteApiConfig) -> Result<Self> {
        Ok(Self {
            registry: EngineRegistry::with_config(fetch_config, remote_config)?,
            sessions: RwLock::new(Vec::new()),
        })
    }

    /// Orchestrator around an injected resource fetcher; tests use this to
    /// control what local engines see on the network.
    pub fn with_fetcher(
        fetcher: Arc<dyn ResourceFetcher>,
        remote_config: RemoteApiConfig,
    ) -> Result<Self> {
        Ok(Self {
            registry: EngineRegistry::with_fetcher(fetcher, remote_config)?,
            sessions: RwLock::new(Vec::new()),
        })
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Start building a session whose engine selection resolves through this
    /// orchestrator's registry.
    pub fn session(&self) -> SessionBuilder<'_> {
        SessionBuilder::new(&self.registry)
    }

    /// Validate each session in turn, then append it to the history.
    ///
    /// No rollback: a session whose later pairs fail unexpectedly keeps its
    /// completed results and still enters history. Each session's full
    /// result set lands in history atomically relative to other sessions'
    /// appends.
    pub async fn orchestrate(&self, sessions: impl IntoIterator<Item = Arc<Session>>) {
        for session in sessions {
            session.validate().await;
            info!(session = %session.id(), results = session.results().len(), "session orchestrated");
            self.sessions.write().unwrap().push(session);
        }
    }

    /// Read-only snapshot of every orchestrated session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().unwrap().clone()
    }
}
