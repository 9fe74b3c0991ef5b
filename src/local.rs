//! Local rule evaluation over fetched reference resources.
//!
//! Nothing is cached across `validate` calls - only the engine instance
//! itself is memoized by the registry. Each call fetches the primary profile
//! and every reference resource, assembles a fresh support chain, parses the
//! payload and evaluates the rules.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::FHIR_VERSION;
use crate::engine::{EngineType, Observability, ValidationEngine};
use crate::error::Result;
use crate::fetch::ResourceFetcher;
use crate::outcome::{
    SEVERITY_ERROR, SEVERITY_INFORMATION, SEVERITY_WARNING, SourceLocation, ValidationIssue,
    ValidationResult,
};
use crate::resources::{CodeSystem, StructureDefinition, ValueSet, parse_resource};
use crate::support::{
    CachingSupport, CodeLookup, CommonTerminologySupport, DefaultProfileSupport,
    InMemoryTerminologySupport, PrePopulatedSupport, SupportChain, ValidationSupport,
};

pub struct LocalRuleEngine {
    observability: Observability,
    profile_url: String,
    structure_definition_urls: HashMap<String, String>,
    code_system_urls: HashMap<String, String>,
    value_set_urls: HashMap<String, String>,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl LocalRuleEngine {
    pub fn new(
        profile_url: impl Into<String>,
        structure_definition_urls: HashMap<String, String>,
        code_system_urls: HashMap<String, String>,
        value_set_urls: HashMap<String, String>,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        let observability = Observability::new(
            EngineType::LocalRule,
            format!(
                "Local rules version {} (FHIR version {})",
                env!("CARGO_PKG_VERSION"),
                FHIR_VERSION
            ),
        );
        Self {
            observability: observability.constructed(),
            profile_url: profile_url.into(),
            structure_definition_urls,
            code_system_urls,
            value_set_urls,
            fetcher,
        }
    }

    /// Fetch the primary profile and every mapped reference resource into a
    /// pre-populated support layer.
    async fn assemble_support(&self) -> Result<CachingSupport> {
        let mut prepopulated = PrePopulatedSupport::new();

        let profile_text = self.fetcher.fetch(&self.profile_url).await?;
        match parse_resource::<StructureDefinition>(&self.profile_url, &profile_text) {
            Some(definition) => prepopulated.add_structure_definition(definition),
            None => info!(
                profile_url = %self.profile_url,
                "primary profile unavailable, validating with degraded context"
            ),
        }

        for url in self.structure_definition_urls.values() {
            let text = self.fetcher.fetch(url).await?;
            if let Some(definition) = parse_resource::<StructureDefinition>(url, &text) {
                prepopulated.add_structure_definition(definition);
            }
        }
        for url in self.code_system_urls.values() {
            let text = self.fetcher.fetch(url).await?;
            if let Some(system) = parse_resource::<CodeSystem>(url, &text) {
                prepopulated.add_code_system(system);
            }
        }
        for url in self.value_set_urls.values() {
            let text = self.fetcher.fetch(url).await?;
            if let Some(value_set) = parse_resource::<ValueSet>(url, &text) {
                prepopulated.add_value_set(value_set);
            }
        }

        debug!(
            structure_definitions = prepopulated.structure_definition_count(),
            "assembled validation support chain"
        );

        let chain = SupportChain::new()
            .add_support(Arc::new(DefaultProfileSupport))
            .add_support(Arc::new(CommonTerminologySupport))
            .add_support(Arc::new(InMemoryTerminologySupport))
            .add_support(Arc::new(prepopulated));

        Ok(CachingSupport::new(chain))
    }

    async fn run(&self, payload: &str) -> Result<(bool, String, Vec<ValidationIssue>)> {
        let support = self.assemble_support().await?;

        let bundle: Value = serde_json::from_str(payload)?;
        let issues = evaluate_bundle(&bundle, &support);
        let valid = !issues.iter().any(ValidationIssue::is_blocking);
        let outcome = operation_outcome_document(&issues);

        Ok((valid, outcome, issues))
    }
}

#[async_trait]
impl ValidationEngine for LocalRuleEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::LocalRule
    }

    fn observability(&self) -> &Observability {
        &self.observability
    }

    fn profile_url(&self) -> &str {
        &self.profile_url
    }

    async fn validate(&self, payload: &str) -> ValidationResult {
        let initiated_at = Utc::now();
        match self.run(payload).await {
            Ok((valid, operation_outcome, issues)) => ValidationResult {
                initiated_at,
                completed_at: Utc::now(),
                profile_url: self.profile_url.clone(),
                observability: self.observability.clone(),
                valid,
                operation_outcome,
                issues,
            },
            Err(error) => ValidationResult::fatal(
                initiated_at,
                &self.profile_url,
                self.observability.clone(),
                error.to_string(),
                error.kind_name(),
            ),
        }
    }
}

/// Evaluate the bundle rules, producing one issue per finding. A result is
/// invalid when any issue carries a blocking severity.
fn evaluate_bundle(bundle: &Value, support: &CachingSupport) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(root) = bundle.as_object() else {
        issues.push(ValidationIssue::new(
            "payload root must be a JSON object",
            SourceLocation::unknown("Bundle"),
            SEVERITY_ERROR,
        ));
        return issues;
    };

    match root.get("resourceType").and_then(Value::as_str) {
        Some("Bundle") => {}
        Some(other) => issues.push(ValidationIssue::new(
            format!("expected resourceType `Bundle`, found `{other}`"),
            SourceLocation::unknown("Bundle.resourceType"),
            SEVERITY_ERROR,
        )),
        None => issues.push(ValidationIssue::new(
            "resourceType is missing",
            SourceLocation::unknown("Bundle.resourceType"),
            SEVERITY_ERROR,
        )),
    }

    if root.get("type").and_then(Value::as_str).is_none() {
        issues.push(ValidationIssue::new(
            "Bundle.type is required",
            SourceLocation::unknown("Bundle.type"),
            SEVERITY_ERROR,
        ));
    }

    check_profile_declarations(root, "Bundle", support, &mut issues);

    match root.get("entry") {
        None => issues.push(ValidationIssue::new(
            "Bundle contains no entries",
            SourceLocation::unknown("Bundle.entry"),
            SEVERITY_INFORMATION,
        )),
        Some(Value::Array(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                evaluate_entry(entry, index, support, &mut issues);
            }
        }
        Some(_) => issues.push(ValidationIssue::new(
            "Bundle.entry must be an array",
            SourceLocation::unknown("Bundle.entry"),
            SEVERITY_ERROR,
        )),
    }

    issues
}

fn evaluate_entry(
    entry: &Value,
    index: usize,
    support: &CachingSupport,
    issues: &mut Vec<ValidationIssue>,
) {
    let path = format!("Bundle.entry[{index}]");

    let resource_value = entry.get("resource");
    let Some(resource) = resource_value.and_then(Value::as_object) else {
        issues.push(ValidationIssue::new(
            "entry has no resource",
            SourceLocation::unknown(format!("{path}.resource")),
            SEVERITY_ERROR,
        ));
        return;
    };

    let resource_path = format!("{path}.resource");
    match resource.get("resourceType").and_then(Value::as_str) {
        None => {
            issues.push(ValidationIssue::new(
                "resource has no resourceType",
                SourceLocation::unknown(format!("{resource_path}.resourceType")),
                SEVERITY_ERROR,
            ));
            return;
        }
        Some(resource_type) => {
            if support.resource_type_known(resource_type) == Some(false) {
                issues.push(ValidationIssue::new(
                    format!("unknown resource type `{resource_type}`"),
                    SourceLocation::unknown(format!("{resource_path}.resourceType")),
                    SEVERITY_ERROR,
                ));
            }
        }
    }

    check_profile_declarations(resource, &resource_path, support, issues);
    if let Some(value) = resource_value {
        check_codings(value, &resource_path, support, issues);
    }
}

/// Every profile a resource declares under `meta.profile` should resolve
/// through the support chain; an unresolvable declaration degrades the
/// strength of validation, so it is reported as a warning.
fn check_profile_declarations(
    resource: &serde_json::Map<String, Value>,
    path: &str,
    support: &CachingSupport,
    issues: &mut Vec<ValidationIssue>,
) {
    let declared = resource
        .get("meta")
        .and_then(|meta| meta.get("profile"))
        .and_then(Value::as_array);
    let Some(profiles) = declared else { return };

    for (index, profile) in profiles.iter().enumerate() {
        if let Some(url) = profile.as_str()
            && support.structure_definition(url).is_none()
        {
            issues.push(ValidationIssue::new(
                format!("declared profile `{url}` could not be resolved"),
                SourceLocation::unknown(format!("{path}.meta.profile[{index}]")),
                SEVERITY_WARNING,
            ));
        }
    }
}

/// Walk a resource for `coding` arrays and validate each (system, code) pair
/// through the terminology layers.
fn check_codings(
    value: &Value,
    path: &str,
    support: &CachingSupport,
    issues: &mut Vec<ValidationIssue>,
) {
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                let child_path = format!("{path}.{key}");
                if key == "coding"
                    && let Some(codings) = child.as_array()
                {
                    for (index, coding) in codings.iter().enumerate() {
                        check_coding(coding, &format!("{child_path}[{index}]"), support, issues);
                    }
                } else {
                    check_codings(child, &child_path, support, issues);
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                check_codings(item, &format!("{path}[{index}]"), support, issues);
            }
        }
        _ => {}
    }
}

fn check_coding(
    coding: &Value,
    path: &str,
    support: &CachingSupport,
    issues: &mut Vec<ValidationIssue>,
) {
    let system = coding.get("system").and_then(Value::as_str);
    let code = coding.get("code").and_then(Value::as_str);
    let (Some(system), Some(code)) = (system, code) else {
        return;
    };

    match support.lookup_code(system, code) {
        CodeLookup::Found => {}
        CodeLookup::NotFound => issues.push(ValidationIssue::new(
            format!("code `{code}` is not defined by system `{system}`"),
            SourceLocation::unknown(path),
            SEVERITY_ERROR,
        )),
        CodeLookup::Unknown => issues.push(ValidationIssue::new(
            format!("code system `{system}` is not recognized by the validation context"),
            SourceLocation::unknown(path),
            SEVERITY_WARNING,
        )),
    }
}

/// Serialize issues as an OperationOutcome-shaped document.
fn operation_outcome_document(issues: &[ValidationIssue]) -> String {
    let outcome_issues: Vec<Value> = if issues.is_empty() {
        vec![json!({
            "severity": "information",
            "code": "informational",
            "diagnostics": "No issues detected during validation",
        })]
    } else {
        issues
            .iter()
            .map(|issue| {
                json!({
                    "severity": issue.severity.to_ascii_lowercase(),
                    "code": "processing",
                    "diagnostics": issue.message,
                    "expression": [issue.location.diagnostics],
                })
            })
            .collect()
    };

    json!({
        "resourceType": "OperationOutcome",
        "issue": outcome_issues,
    })
    .to_string()
}
