//! The common contract every validation backend implements.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::OrchestrateError;
use crate::outcome::ValidationResult;

/// The closed set of validation backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EngineType {
    /// Local rule evaluation over fetched reference resources.
    LocalRule,
    /// No-op reference baseline.
    EmbeddedReference,
    /// Remote HTTP validator service.
    RemoteApi,
}

impl EngineType {
    /// Identifier used in engine-selection strategy descriptors.
    pub fn strategy_name(&self) -> &'static str {
        match self {
            EngineType::LocalRule => "HAPI",
            EngineType::EmbeddedReference => "HL7-Official-Embedded",
            EngineType::RemoteApi => "HL7-Official-API",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy_name())
    }
}

impl FromStr for EngineType {
    type Err = OrchestrateError;

    /// Resolve a strategy identifier. Unknown identifiers are a
    /// configuration error; callers that must not fail (the strategy
    /// descriptor path) convert this into a diagnostic instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HAPI" => Ok(EngineType::LocalRule),
            "HL7-Official-Embedded" => Ok(EngineType::EmbeddedReference),
            "HL7-Official-API" => Ok(EngineType::RemoteApi),
            other => Err(OrchestrateError::Config(format!(
                "unknown validation engine type: `{other}`"
            ))),
        }
    }
}

/// Identity and construction-time metadata carried by every engine and
/// copied into each result it produces.
#[derive(Debug, Clone, Serialize)]
pub struct Observability {
    /// Stable identity string for the engine implementation.
    pub identity: String,
    /// Human-readable description, including backend version info.
    pub description: String,
    /// When initialization of the engine began.
    pub initiated_at: DateTime<Utc>,
    /// When construction finished.
    pub constructed_at: DateTime<Utc>,
}

impl Observability {
    pub fn new(engine_type: EngineType, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            identity: format!("{}::{:?}", env!("CARGO_PKG_NAME"), engine_type),
            description: description.into(),
            initiated_at: now,
            constructed_at: now,
        }
    }

    /// Record the moment construction completed, after any setup work that
    /// followed `new`.
    pub fn constructed(mut self) -> Self {
        self.constructed_at = Utc::now();
        self
    }
}

/// A pluggable validation backend.
///
/// `validate` is total: engines convert every internal failure into a FATAL
/// issue inside the returned result rather than propagating errors. Callers
/// detect validation problems by inspecting `valid` and the issue list.
#[async_trait]
pub trait ValidationEngine: Send + Sync {
    fn engine_type(&self) -> EngineType;

    fn observability(&self) -> &Observability;

    /// Profile URL this engine instance was built for.
    fn profile_url(&self) -> &str;

    async fn validate(&self, payload: &str) -> ValidationResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_name_round_trip() {
        for engine_type in [
            EngineType::LocalRule,
            EngineType::EmbeddedReference,
            EngineType::RemoteApi,
        ] {
            let parsed: EngineType = engine_type.strategy_name().parse().unwrap();
            assert_eq!(parsed, engine_type);
        }
    }

    #[test]
    fn test_unknown_identifier_is_config_error() {
        let err = "Inferno".parse::<EngineType>().unwrap_err();
        match err {
            OrchestrateError::Config(message) => assert!(message.contains("Inferno")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_observability_timestamps() {
        let observability =
            Observability::new(EngineType::LocalRule, "local rules v1").constructed();
        assert!(observability.constructed_at >= observability.initiated_at);
        assert!(observability.identity.contains("LocalRule"));
    }
}
