//! Remote HTTP validator backend.
//!
//! Submits the payload to an external validation service and maps the
//! response into the generic result model. Validity is decided by a marker
//! substring in the response body; the issue list is best-effort parsed from
//! the response JSON and may be partial or empty without failing the call.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::FHIR_VERSION;
use crate::engine::{EngineType, Observability, ValidationEngine};
use crate::error::Result;
use crate::outcome::{SourceLocation, ValidationIssue, ValidationResult};

/// Marker the service embeds in every structured validation report.
const OUTCOME_MARKER: &str = "OperationOutcome";

/// Diagnostics slot for issues attributed to the remote service.
const REMOTE_DIAGNOSTICS: &str = "remote-validator-response";

/// Configuration for the remote validator service.
#[derive(Debug, Clone)]
pub struct RemoteApiConfig {
    pub endpoint: String,
    /// Connect and request timeout in seconds; the only timeout in the
    /// orchestration core.
    pub timeout_seconds: u64,
    pub locale: String,
}

impl Default for RemoteApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://validator.fhir.org/validate".to_string(),
            timeout_seconds: 120,
            locale: "en".to_string(),
        }
    }
}

impl RemoteApiConfig {
    /// Build the shared HTTP client for remote validation requests.
    pub fn build_client(&self) -> Result<Client> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(self.timeout_seconds))
            .timeout(Duration::from_secs(self.timeout_seconds))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(client)
    }
}

pub struct RemoteApiEngine {
    observability: Observability,
    profile_url: String,
    client: Client,
    config: RemoteApiConfig,
}

impl RemoteApiEngine {
    pub fn new(profile_url: impl Into<String>, client: Client, config: RemoteApiConfig) -> Self {
        let observability = Observability::new(
            EngineType::RemoteApi,
            format!("Remote validator at {} (FHIR version {})", config.endpoint, FHIR_VERSION),
        );
        Self {
            observability: observability.constructed(),
            profile_url: profile_url.into(),
            client,
            config,
        }
    }
}

#[async_trait]
impl ValidationEngine for RemoteApiEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::RemoteApi
    }

    fn observability(&self) -> &Observability {
        &self.observability
    }

    fn profile_url(&self) -> &str {
        &self.profile_url
    }

    async fn validate(&self, payload: &str) -> ValidationResult {
        let initiated_at = Utc::now();

        let body = request_body(&self.profile_url, &self.config.locale, payload);

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await;

        let response_body = match response {
            Ok(response) => match response.text().await {
                Ok(text) => text,
                Err(error) => {
                    return ValidationResult::fatal(
                        initiated_at,
                        &self.profile_url,
                        self.observability.clone(),
                        error.to_string(),
                        "HttpTransportError",
                    );
                }
            },
            // Connection refused, DNS failure, timeout: synthesized as a
            // FATAL issue, consistent with the local engine's containment.
            Err(error) => {
                warn!(endpoint = %self.config.endpoint, %error, "remote validation request failed");
                return ValidationResult::fatal(
                    initiated_at,
                    &self.profile_url,
                    self.observability.clone(),
                    error.to_string(),
                    "HttpTransportError",
                );
            }
        };

        debug!(bytes = response_body.len(), "remote validator responded");

        ValidationResult {
            initiated_at,
            completed_at: Utc::now(),
            profile_url: self.profile_url.clone(),
            observability: self.observability.clone(),
            valid: response_validity(&response_body),
            operation_outcome: String::new(),
            issues: extract_issues(&response_body),
        }
    }
}

/// Normalize bare newlines to CRLF pairs; the service expects Windows-style
/// line separators inside submitted file content.
fn normalize_newlines(payload: &str) -> String {
    payload.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Fixed-shape request body for the validation service.
fn request_body(profile_url: &str, locale: &str, payload: &str) -> String {
    json!({
        "cliContext": {
            "sv": FHIR_VERSION,
            "ig": [profile_url],
            "locale": locale,
        },
        "filesToValidate": [{
            "fileName": "input.json",
            "fileContent": normalize_newlines(payload),
            "fileType": "json",
        }],
    })
    .to_string()
}

/// Validity is a substring check, independent of issue content.
fn response_validity(response_body: &str) -> bool {
    response_body.contains(OUTCOME_MARKER)
}

/// Walk `outcomes[].issues[]` in the response. A malformed response yields a
/// partial or empty list; it never fails the call.
fn extract_issues(response_body: &str) -> Vec<ValidationIssue> {
    let root: Value = match serde_json::from_str(response_body) {
        Ok(root) => root,
        Err(error) => {
            warn!(%error, "remote validator response did not parse, returning no issues");
            return Vec::new();
        }
    };

    let mut issues = Vec::new();
    let Some(outcomes) = root.get("outcomes").and_then(Value::as_array) else {
        return issues;
    };

    for outcome in outcomes {
        let Some(outcome_issues) = outcome.get("issues").and_then(Value::as_array) else {
            continue;
        };
        for issue in outcome_issues {
            let message = issue
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let line = issue.get("line").and_then(Value::as_i64);
            let column = issue.get("col").and_then(Value::as_i64);
            let severity = issue
                .get("level")
                .and_then(Value::as_str)
                .unwrap_or_default();
            issues.push(ValidationIssue::new(
                message,
                SourceLocation::new(line, column, REMOTE_DIAGNOSTICS),
                severity,
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = request_body("http://example.com/profile", "en", "{\"a\":1}");
        let parsed: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(parsed["cliContext"]["sv"], FHIR_VERSION);
        assert_eq!(parsed["cliContext"]["ig"][0], "http://example.com/profile");
        assert_eq!(parsed["cliContext"]["locale"], "en");
        assert_eq!(parsed["filesToValidate"][0]["fileName"], "input.json");
        assert_eq!(parsed["filesToValidate"][0]["fileType"], "json");
        assert_eq!(parsed["filesToValidate"][0]["fileContent"], "{\"a\":1}");
    }

    #[test]
    fn test_newline_normalization() {
        assert_eq!(normalize_newlines("a\nb"), "a\r\nb");
        // Already-normalized input is unchanged, not doubled.
        assert_eq!(normalize_newlines("a\r\nb"), "a\r\nb");
        let body = request_body("http://example.com/p", "en", "{\n  \"a\": 1\n}");
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["filesToValidate"][0]["fileContent"], "{\r\n  \"a\": 1\r\n}");
    }

    #[test]
    fn test_validity_marker_present() {
        let body = r#"{"outcomes": [{"issues": [{"message": "bad", "level": "error"}]}],
                       "kind": "OperationOutcome"}"#;
        assert!(response_validity(body));
    }

    #[test]
    fn test_validity_marker_absent() {
        // Issue content is irrelevant; only the marker decides.
        let body = r#"{"outcomes": [{"issues": []}]}"#;
        assert!(!response_validity(body));
    }

    #[test]
    fn test_extract_issues_maps_fields() {
        let body = r#"{
            "outcomes": [{
                "issues": [
                    {"message": "missing element", "line": 12, "col": 3, "level": "error"},
                    {"message": "unattributed", "line": null, "col": "n/a", "level": "warning"}
                ]
            }]
        }"#;
        let issues = extract_issues(body);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].message, "missing element");
        assert_eq!(issues[0].location.line, Some(12));
        assert_eq!(issues[0].location.column, Some(3));
        assert_eq!(issues[0].severity, "error");
        // Non-integer line/col map to None.
        assert_eq!(issues[1].location.line, None);
        assert_eq!(issues[1].location.column, None);
    }

    #[test]
    fn test_extract_issues_tolerates_malformed_response() {
        assert!(extract_issues("<html>bad gateway</html>").is_empty());
        assert!(extract_issues(r#"{"outcomes": "not an array"}"#).is_empty());
        assert!(extract_issues(r#"{"outcomes": [{"issues": "nope"}]}"#).is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_contained_as_fatal() {
        let config = RemoteApiConfig {
            // Reserved TEST-NET-1 address, nothing listens there.
            endpoint: "http://192.0.2.1/validate".to_string(),
            timeout_seconds: 1,
            ..Default::default()
        };
        let client = config.build_client().unwrap();
        let engine = RemoteApiEngine::new("http://example.com/profile", client, config);

        let result = engine.validate("{}").await;

        assert!(!result.is_valid());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, "FATAL");
        assert_eq!(result.issues[0].location.diagnostics, "HttpTransportError");
        assert!(result.completed_at >= result.initiated_at);
    }
}
