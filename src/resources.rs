//! Lenient models of the reference resources the local rule engine fetches.
//!
//! Fetched documents come from terminology servers and implementation-guide
//! hosts of varying quality, so parsing is deliberately forgiving: unknown
//! fields are ignored, missing fields default, and a document that fails to
//! parse contributes nothing instead of failing the validate call.

use serde::Deserialize;
use tracing::warn;

/// A structural contract (document schema) resources may declare conformance
/// to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructureDefinition {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Resource type this definition constrains, e.g. "Bundle".
    #[serde(default, rename = "type")]
    pub constrained_type: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

/// A terminology code system with its concept codes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeSystem {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub concept: Vec<Concept>,
}

impl CodeSystem {
    /// Whether `code` is defined by this system, searching nested concepts.
    pub fn defines_code(&self, code: &str) -> bool {
        fn search(concepts: &[Concept], code: &str) -> bool {
            concepts
                .iter()
                .any(|c| c.code.as_deref() == Some(code) || search(&c.concept, code))
        }
        search(&self.concept, code)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Concept {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    /// Nested child concepts.
    #[serde(default)]
    pub concept: Vec<Concept>,
}

/// A permitted set of codes drawn from one or more code systems.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueSet {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub compose: Option<ValueSetCompose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueSetCompose {
    #[serde(default)]
    pub include: Vec<ValueSetInclude>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueSetInclude {
    #[serde(default)]
    pub system: Option<String>,
    /// Explicitly enumerated codes; an empty list includes the whole system.
    #[serde(default)]
    pub concept: Vec<Concept>,
}

/// Parse a fetched reference resource, returning `None` for empty or
/// malformed content. The caller logs nothing extra; degradation is recorded
/// here with the offending URL.
pub fn parse_resource<T>(url: &str, content: &str) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    if content.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(content) {
        Ok(resource) => Some(resource),
        Err(error) => {
            warn!(url, %error, "reference resource did not parse, skipping");
            None
        }
    }
}
