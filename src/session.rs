//! Sessions batch payloads against a selected set of engines.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};
use uuid::Uuid;

use crate::device::Device;
use crate::engine::{EngineType, ValidationEngine};
use crate::outcome::ValidationResult;
use crate::registry::EngineRegistry;
use crate::strategy::parse_strategy;

/// One batch of payloads validated against one chosen set of engines.
///
/// The payload and engine lists are frozen at `build()`; only the result
/// list grows. Results are appended in payload-major, engine-minor order,
/// both in their original list order. Calling [`Session::validate`] again on
/// an already-validated session appends a second full pass rather than
/// replacing results - callers re-running validation must account for that.
pub struct Session {
    id: Uuid,
    device: Device,
    payloads: Vec<String>,
    engines: Vec<Arc<dyn ValidationEngine>>,
    results: RwLock<Vec<ValidationResult>>,
    profile_url: String,
    structure_definition_urls: HashMap<String, String>,
    code_system_urls: HashMap<String, String>,
    value_set_urls: HashMap<String, String>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn payloads(&self) -> &[String] {
        &self.payloads
    }

    pub fn engines(&self) -> &[Arc<dyn ValidationEngine>] {
        &self.engines
    }

    pub fn profile_url(&self) -> &str {
        &self.profile_url
    }

    pub fn structure_definition_urls(&self) -> &HashMap<String, String> {
        &self.structure_definition_urls
    }

    pub fn code_system_urls(&self) -> &HashMap<String, String> {
        &self.code_system_urls
    }

    pub fn value_set_urls(&self) -> &HashMap<String, String> {
        &self.value_set_urls
    }

    /// Snapshot of the results accumulated so far.
    pub fn results(&self) -> Vec<ValidationResult> {
        self.results.read().unwrap().clone()
    }

    /// Run every payload through every engine, strictly sequentially,
    /// appending one result per (payload, engine) pair.
    pub async fn validate(&self) {
        info!(
            session = %self.id,
            payloads = self.payloads.len(),
            engines = self.engines.len(),
            "validating session"
        );
        for payload in &self.payloads {
            for engine in &self.engines {
                let result = engine.validate(payload).await;
                self.results.write().unwrap().push(result);
            }
        }
    }
}

/// Fluent accumulation of a session's payloads, context and engine set.
///
/// Obtained from [`crate::orchestrator::Orchestrator::session`]; engine
/// selection goes through the orchestrator's registry so instances are
/// shared across sessions with the same profile URL.
pub struct SessionBuilder<'a> {
    registry: &'a EngineRegistry,
    payloads: Vec<String>,
    engines: Vec<Arc<dyn ValidationEngine>>,
    device: Device,
    profile_url: String,
    structure_definition_urls: HashMap<String, String>,
    code_system_urls: HashMap<String, String>,
    value_set_urls: HashMap<String, String>,
    strategy_issues: Vec<String>,
}

impl<'a> SessionBuilder<'a> {
    pub(crate) fn new(registry: &'a EngineRegistry) -> Self {
        Self {
            registry,
            payloads: Vec::new(),
            engines: Vec::new(),
            device: Device::current().clone(),
            profile_url: String::new(),
            structure_definition_urls: HashMap::new(),
            code_system_urls: HashMap::new(),
            value_set_urls: HashMap::new(),
            strategy_issues: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payloads.push(payload.into());
        self
    }

    pub fn with_payloads(mut self, payloads: impl IntoIterator<Item = String>) -> Self {
        self.payloads.extend(payloads);
        self
    }

    pub fn on_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_profile_url(mut self, profile_url: impl Into<String>) -> Self {
        self.profile_url = profile_url.into();
        self
    }

    pub fn with_structure_definition_urls(mut self, urls: HashMap<String, String>) -> Self {
        self.structure_definition_urls = urls;
        self
    }

    pub fn with_code_system_urls(mut self, urls: HashMap<String, String>) -> Self {
        self.code_system_urls = urls;
        self
    }

    pub fn with_value_set_urls(mut self, urls: HashMap<String, String>) -> Self {
        self.value_set_urls = urls;
        self
    }

    /// Add a caller-constructed engine instance, bypassing the registry.
    pub fn add_engine(mut self, engine: Arc<dyn ValidationEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    /// Add the memoized engine of `engine_type` for the current profile URL.
    pub async fn add_engine_type(mut self, engine_type: EngineType) -> Self {
        let engine = self
            .registry
            .get_or_create(
                engine_type,
                &self.profile_url,
                &self.structure_definition_urls,
                &self.code_system_urls,
                &self.value_set_urls,
            )
            .await;
        self.engines.push(engine);
        self
    }

    pub async fn add_local_rule_engine(self) -> Self {
        self.add_engine_type(EngineType::LocalRule).await
    }

    pub async fn add_embedded_engine(self) -> Self {
        self.add_engine_type(EngineType::EmbeddedReference).await
    }

    pub async fn add_remote_api_engine(self) -> Self {
        self.add_engine_type(EngineType::RemoteApi).await
    }

    /// Apply an engine-selection strategy descriptor.
    ///
    /// Recognized identifiers resolve through the registry in descriptor
    /// order; everything unusable lands in [`Self::strategy_issues`] and
    /// never aborts the builder. With `clear_existing`, previously added
    /// engines are discarded before the descriptor's list is applied -
    /// provided the descriptor actually carried one.
    pub async fn with_strategy(mut self, descriptor: &str, clear_existing: bool) -> Self {
        let selection = parse_strategy(descriptor);
        for diagnostic in &selection.diagnostics {
            warn!(%diagnostic, "strategy descriptor issue");
        }
        self.strategy_issues.extend(selection.diagnostics);

        if clear_existing && selection.has_engine_list {
            self.engines.clear();
        }
        for engine_type in selection.engines {
            self = self.add_engine_type(engine_type).await;
        }
        self
    }

    /// Diagnostics collected from strategy descriptors so far, for the
    /// caller to display or log.
    pub fn strategy_issues(&self) -> &[String] {
        &self.strategy_issues
    }

    /// Freeze the accumulated lists into an immutable session.
    pub fn build(self) -> Arc<Session> {
        Arc::new(Session {
            id: Uuid::new_v4(),
            device: self.device,
            payloads: self.payloads,
            engines: self.engines,
            results: RwLock::new(Vec::new()),
            profile_url: self.profile_url,
            structure_definition_urls: self.structure_definition_urls,
            code_system_urls: self.code_system_urls,
            value_set_urls: self.value_set_urls,
        })
    }
}
