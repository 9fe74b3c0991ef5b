//! Shared test fixtures: canned and failing resource fetchers, payloads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use validate_fhir::{OrchestrateError, ResourceFetcher, Result};

pub const PROFILE_URL: &str = "http://example.com/profiles/submission-bundle";

/// Fetcher serving canned documents and recording every requested URL.
/// Unknown URLs yield empty text, like the degraded HTTP path.
pub struct CannedFetcher {
    responses: HashMap<String, String>,
    request_log: Mutex<Vec<String>>,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            request_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_profile(self) -> Self {
        let profile = json!({
            "resourceType": "StructureDefinition",
            "url": PROFILE_URL,
            "type": "Bundle",
            "kind": "resource",
        })
        .to_string();
        self.with(PROFILE_URL, &profile)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.request_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.request_log.lock().unwrap().push(url.to_string());
        Ok(self.responses.get(url).cloned().unwrap_or_default())
    }
}

/// Fetcher simulating a hard network failure on every request.
pub struct FailingFetcher;

#[async_trait]
impl ResourceFetcher for FailingFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        Err(OrchestrateError::HttpStatus {
            url: url.to_string(),
            status: 502,
        })
    }
}

pub fn canned_fetcher() -> Arc<CannedFetcher> {
    Arc::new(CannedFetcher::new().with_profile())
}

/// A minimal well-formed submission bundle.
pub fn bundle_payload(patient_id: &str) -> String {
    json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": [{"resource": {"resourceType": "Patient", "id": patient_id}}]
    })
    .to_string()
}
