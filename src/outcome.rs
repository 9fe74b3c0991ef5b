//! Value types describing validation outcomes.
//!
//! One `ValidationResult` is produced per (payload, engine) pair. The types
//! here are plain owned data so results can be cloned into session history
//! and serialized for downstream storage without touching the engine that
//! produced them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::Observability;

/// Severity used when an engine converts an internal error into an issue.
pub const SEVERITY_FATAL: &str = "FATAL";
/// Severity that, together with FATAL, makes a local result invalid.
pub const SEVERITY_ERROR: &str = "ERROR";
pub const SEVERITY_WARNING: &str = "WARNING";
pub const SEVERITY_INFORMATION: &str = "INFORMATION";

/// Position of an issue within the submitted payload.
///
/// Line and column are absent when the backend could not attribute the issue
/// to a location; `diagnostics` carries backend-specific context (for a
/// synthesized FATAL issue it holds the error kind name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: Option<i64>,
    pub column: Option<i64>,
    pub diagnostics: String,
}

impl SourceLocation {
    pub fn new(line: Option<i64>, column: Option<i64>, diagnostics: impl Into<String>) -> Self {
        Self {
            line,
            column,
            diagnostics: diagnostics.into(),
        }
    }

    /// Location with no line/column attribution.
    pub fn unknown(diagnostics: impl Into<String>) -> Self {
        Self::new(None, None, diagnostics)
    }
}

/// A single finding reported by a validation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    pub location: SourceLocation,
    /// Free-text severity category, e.g. "FATAL", "ERROR", "WARNING",
    /// "INFORMATION". Kept as text because remote backends report their own
    /// vocabulary.
    pub severity: String,
}

impl ValidationIssue {
    pub fn new(
        message: impl Into<String>,
        location: SourceLocation,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            location,
            severity: severity.into(),
        }
    }

    /// True for severities that invalidate a result (ERROR and FATAL).
    pub fn is_blocking(&self) -> bool {
        self.severity.eq_ignore_ascii_case(SEVERITY_ERROR)
            || self.severity.eq_ignore_ascii_case(SEVERITY_FATAL)
    }
}

/// Outcome of validating one payload with one engine.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub initiated_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub profile_url: String,
    pub observability: Observability,
    pub valid: bool,
    /// Serialized backend-specific outcome document; empty when the backend
    /// produces none.
    pub operation_outcome: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Synthesize the result for an internal engine failure: invalid, with a
    /// single FATAL issue whose diagnostics names the error kind. This is the
    /// containment contract shared by the engines - no error escapes
    /// `validate`.
    pub fn fatal(
        initiated_at: DateTime<Utc>,
        profile_url: impl Into<String>,
        observability: Observability,
        message: impl Into<String>,
        error_kind: impl Into<String>,
    ) -> Self {
        Self {
            initiated_at,
            completed_at: Utc::now(),
            profile_url: profile_url.into(),
            observability,
            valid: false,
            operation_outcome: String::new(),
            issues: vec![ValidationIssue::new(
                message,
                SourceLocation::unknown(error_kind),
                SEVERITY_FATAL,
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineType, Observability};

    fn observability() -> Observability {
        Observability::new(EngineType::EmbeddedReference, "test engine")
    }

    #[test]
    fn test_fatal_result_shape() {
        let initiated_at = Utc::now();
        let result = ValidationResult::fatal(
            initiated_at,
            "http://example.com/profile",
            observability(),
            "connection refused",
            "HttpTransportError",
        );

        assert!(!result.is_valid());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, SEVERITY_FATAL);
        assert_eq!(result.issues[0].message, "connection refused");
        assert_eq!(result.issues[0].location.line, None);
        assert_eq!(result.issues[0].location.column, None);
        assert_eq!(result.issues[0].location.diagnostics, "HttpTransportError");
        assert!(result.completed_at >= result.initiated_at);
        assert!(result.operation_outcome.is_empty());
    }

    #[test]
    fn test_blocking_severities() {
        let location = SourceLocation::unknown("");
        assert!(ValidationIssue::new("m", location.clone(), "ERROR").is_blocking());
        assert!(ValidationIssue::new("m", location.clone(), "fatal").is_blocking());
        assert!(!ValidationIssue::new("m", location.clone(), "WARNING").is_blocking());
        assert!(!ValidationIssue::new("m", location, "INFORMATION").is_blocking());
    }

    #[test]
    fn test_result_serializes() {
        let result = ValidationResult::fatal(
            Utc::now(),
            "http://example.com/profile",
            observability(),
            "boom",
            "PayloadParseError",
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["issues"][0]["severity"], "FATAL");
        assert_eq!(json["issues"][0]["location"]["diagnostics"], "PayloadParseError");
    }
}
