//! Layered validation support.
//!
//! The local rule engine evaluates payloads against a chain of support
//! layers, each able to answer (or decline to answer) three questions: is a
//! resource type known, can a structure definition URL be resolved, and is a
//! (system, code) pair valid. Layers are consulted in order and the first
//! definitive answer wins. A caching wrapper memoizes answers for the
//! duration of one validate call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::resources::{CodeSystem, StructureDefinition, ValueSet};

/// Answer from a terminology lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeLookup {
    /// The system is known to this layer and defines the code.
    Found,
    /// The system is known to this layer but the code is not defined.
    NotFound,
    /// This layer has no opinion about the system.
    Unknown,
}

/// One layer of validation context.
pub trait ValidationSupport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve a structure definition by canonical URL.
    fn structure_definition(&self, _url: &str) -> Option<Arc<StructureDefinition>> {
        None
    }

    /// Whether `resource_type` is a known resource kind; `None` when the
    /// layer has no opinion.
    fn resource_type_known(&self, _resource_type: &str) -> Option<bool> {
        None
    }

    /// Validate a (system, code) pair.
    fn lookup_code(&self, _system: &str, _code: &str) -> CodeLookup {
        CodeLookup::Unknown
    }

    /// Resolve a value set by canonical URL.
    fn value_set(&self, _url: &str) -> Option<Arc<ValueSet>> {
        None
    }
}

/// Base resource types every validation context recognizes, independent of
/// any fetched profile.
const BASE_RESOURCE_TYPES: &[&str] = &[
    "Bundle",
    "Patient",
    "Practitioner",
    "PractitionerRole",
    "Organization",
    "Location",
    "Encounter",
    "Observation",
    "Condition",
    "Procedure",
    "Consent",
    "ServiceRequest",
    "MedicationRequest",
    "Questionnaire",
    "QuestionnaireResponse",
    "DiagnosticReport",
    "Immunization",
    "AllergyIntolerance",
    "CarePlan",
    "Goal",
    "OperationOutcome",
    "Provenance",
    "RelatedPerson",
    "Coverage",
    "Claim",
    "ExplanationOfBenefit",
];

/// Built-in default rules: the base resource-type vocabulary.
pub struct DefaultProfileSupport;

impl ValidationSupport for DefaultProfileSupport {
    fn name(&self) -> &'static str {
        "default-profile"
    }

    fn resource_type_known(&self, resource_type: &str) -> Option<bool> {
        Some(BASE_RESOURCE_TYPES.contains(&resource_type))
    }
}

/// Ubiquitous code systems whose full code inventories are impractical to
/// carry; membership of the system itself is taken as sufficient.
const COMMON_CODE_SYSTEMS: &[&str] = &[
    "http://unitsofmeasure.org",
    "http://loinc.org",
    "http://snomed.info/sct",
    "http://hl7.org/fhir/sid/icd-10-cm",
    "http://www.nlm.nih.gov/research/umls/rxnorm",
    "urn:ietf:bcp:47",
    "urn:ietf:bcp:13",
];

/// Common terminology rules for well-known external code systems.
pub struct CommonTerminologySupport;

impl ValidationSupport for CommonTerminologySupport {
    fn name(&self) -> &'static str {
        "common-terminology"
    }

    fn lookup_code(&self, system: &str, code: &str) -> CodeLookup {
        if !COMMON_CODE_SYSTEMS.contains(&system) {
            return CodeLookup::Unknown;
        }
        if code.trim().is_empty() {
            CodeLookup::NotFound
        } else {
            CodeLookup::Found
        }
    }
}

/// Pre-populated custom resources: the primary profile plus everything
/// fetched from the session's reference URL maps.
#[derive(Default)]
pub struct PrePopulatedSupport {
    structure_definitions: HashMap<String, Arc<StructureDefinition>>,
    code_systems: HashMap<String, Arc<CodeSystem>>,
    value_sets: HashMap<String, Arc<ValueSet>>,
}

impl PrePopulatedSupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_structure_definition(&mut self, definition: StructureDefinition) {
        if let Some(url) = definition.url.clone() {
            self.structure_definitions.insert(url, Arc::new(definition));
        }
    }

    pub fn add_code_system(&mut self, system: CodeSystem) {
        if let Some(url) = system.url.clone() {
            self.code_systems.insert(url, Arc::new(system));
        }
    }

    pub fn add_value_set(&mut self, value_set: ValueSet) {
        if let Some(url) = value_set.url.clone() {
            self.value_sets.insert(url, Arc::new(value_set));
        }
    }

    pub fn structure_definition_count(&self) -> usize {
        self.structure_definitions.len()
    }
}

impl ValidationSupport for PrePopulatedSupport {
    fn name(&self) -> &'static str {
        "pre-populated"
    }

    fn structure_definition(&self, url: &str) -> Option<Arc<StructureDefinition>> {
        self.structure_definitions.get(url).cloned()
    }

    fn resource_type_known(&self, resource_type: &str) -> Option<bool> {
        let known = self
            .structure_definitions
            .values()
            .any(|sd| sd.constrained_type.as_deref() == Some(resource_type));
        // Only a positive answer; absence here says nothing about the type.
        known.then_some(true)
    }

    fn lookup_code(&self, system: &str, code: &str) -> CodeLookup {
        match self.code_systems.get(system) {
            Some(code_system) if code_system.defines_code(code) => CodeLookup::Found,
            Some(_) => CodeLookup::NotFound,
            None => CodeLookup::Unknown,
        }
    }

    fn value_set(&self, url: &str) -> Option<Arc<ValueSet>> {
        self.value_sets.get(url).cloned()
    }
}

/// In-memory terminology evaluation over value sets visible to the chain.
pub struct InMemoryTerminologySupport;

impl InMemoryTerminologySupport {
    /// Whether (system, code) is a member of `value_set`. An include with no
    /// enumerated concepts admits every code of its system.
    pub fn code_in_value_set(value_set: &ValueSet, system: &str, code: &str) -> bool {
        let Some(compose) = &value_set.compose else {
            return false;
        };
        compose.include.iter().any(|include| {
            include.system.as_deref() == Some(system)
                && (include.concept.is_empty()
                    || include
                        .concept
                        .iter()
                        .any(|concept| concept.code.as_deref() == Some(code)))
        })
    }
}

impl ValidationSupport for InMemoryTerminologySupport {
    fn name(&self) -> &'static str {
        "in-memory-terminology"
    }
}

/// Ordered composition of support layers; first definitive answer wins.
pub struct SupportChain {
    layers: Vec<Arc<dyn ValidationSupport>>,
}

impl SupportChain {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn add_support(mut self, layer: Arc<dyn ValidationSupport>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Membership check routed through the chain's value-set resolution and
    /// the in-memory terminology evaluator. `None` when the value set itself
    /// cannot be resolved.
    pub fn code_in_value_set(&self, value_set_url: &str, system: &str, code: &str) -> Option<bool> {
        let value_set = self.value_set(value_set_url)?;
        Some(InMemoryTerminologySupport::code_in_value_set(
            &value_set, system, code,
        ))
    }
}

impl Default for SupportChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationSupport for SupportChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn structure_definition(&self, url: &str) -> Option<Arc<StructureDefinition>> {
        self.layers
            .iter()
            .find_map(|layer| layer.structure_definition(url))
    }

    fn resource_type_known(&self, resource_type: &str) -> Option<bool> {
        // A positive answer from any layer wins over a negative one.
        let mut verdict = None;
        for layer in &self.layers {
            match layer.resource_type_known(resource_type) {
                Some(true) => return Some(true),
                Some(false) => verdict = Some(false),
                None => {}
            }
        }
        verdict
    }

    fn lookup_code(&self, system: &str, code: &str) -> CodeLookup {
        for layer in &self.layers {
            match layer.lookup_code(system, code) {
                CodeLookup::Unknown => continue,
                definitive => return definitive,
            }
        }
        CodeLookup::Unknown
    }

    fn value_set(&self, url: &str) -> Option<Arc<ValueSet>> {
        self.layers.iter().find_map(|layer| layer.value_set(url))
    }
}

/// Memoizing wrapper around a chain, scoped to a single validate call.
/// Payloads repeat the same codings and profile references heavily, so
/// lookups are answered once.
pub struct CachingSupport {
    inner: SupportChain,
    code_lookups: Mutex<HashMap<(String, String), CodeLookup>>,
    type_lookups: Mutex<HashMap<String, Option<bool>>>,
}

impl CachingSupport {
    pub fn new(inner: SupportChain) -> Self {
        Self {
            inner,
            code_lookups: Mutex::new(HashMap::new()),
            type_lookups: Mutex::new(HashMap::new()),
        }
    }

    pub fn code_in_value_set(&self, value_set_url: &str, system: &str, code: &str) -> Option<bool> {
        self.inner.code_in_value_set(value_set_url, system, code)
    }
}

impl ValidationSupport for CachingSupport {
    fn name(&self) -> &'static str {
        "caching"
    }

    fn structure_definition(&self, url: &str) -> Option<Arc<StructureDefinition>> {
        self.inner.structure_definition(url)
    }

    fn resource_type_known(&self, resource_type: &str) -> Option<bool> {
        if let Some(cached) = self.type_lookups.lock().unwrap().get(resource_type) {
            return *cached;
        }
        let verdict = self.inner.resource_type_known(resource_type);
        self.type_lookups
            .lock()
            .unwrap()
            .insert(resource_type.to_string(), verdict);
        verdict
    }

    fn lookup_code(&self, system: &str, code: &str) -> CodeLookup {
        let key = (system.to_string(), code.to_string());
        if let Some(cached) = self.code_lookups.lock().unwrap().get(&key) {
            return cached.clone();
        }
        let verdict = self.inner.lookup_code(system, code);
        self.code_lookups.lock().unwrap().insert(key, verdict.clone());
        verdict
    }

    fn value_set(&self, url: &str) -> Option<Arc<ValueSet>> {
        self.inner.value_set(url)
    }
}
