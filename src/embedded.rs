//! No-op reference baseline.
//!
//! Accepts every payload. Exists so orchestration behavior (ordering,
//! history, result plumbing) can be exercised and compared against a backend
//! that never fails.

use async_trait::async_trait;
use chrono::Utc;

use crate::engine::{EngineType, Observability, ValidationEngine};
use crate::outcome::ValidationResult;

pub struct EmbeddedReferenceEngine {
    observability: Observability,
    profile_url: String,
}

impl EmbeddedReferenceEngine {
    pub fn new(profile_url: impl Into<String>) -> Self {
        let observability = Observability::new(
            EngineType::EmbeddedReference,
            format!("Embedded reference baseline {}", env!("CARGO_PKG_VERSION")),
        );
        Self {
            observability: observability.constructed(),
            profile_url: profile_url.into(),
        }
    }
}

#[async_trait]
impl ValidationEngine for EmbeddedReferenceEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::EmbeddedReference
    }

    fn observability(&self) -> &Observability {
        &self.observability
    }

    fn profile_url(&self) -> &str {
        &self.profile_url
    }

    async fn validate(&self, _payload: &str) -> ValidationResult {
        let initiated_at = Utc::now();
        ValidationResult {
            initiated_at,
            completed_at: Utc::now(),
            profile_url: self.profile_url.clone(),
            observability: self.observability.clone(),
            valid: true,
            operation_outcome: String::new(),
            issues: Vec::new(),
        }
    }
}
