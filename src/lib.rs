//! # validate-fhir Library
//!
//! An async-first Rust library for orchestrating validation of healthcare
//! data bundles across interchangeable validation backends, with memoized
//! engine instances and ordered multi-engine sessions.

pub mod device;
pub mod embedded;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod local;
pub mod orchestrator;
pub mod outcome;
pub mod registry;
pub mod remote;
pub mod resources;
pub mod session;
pub mod strategy;
pub mod support;

/// FHIR release every backend validates against.
pub const FHIR_VERSION: &str = "4.0.1";

pub use device::Device;
pub use embedded::EmbeddedReferenceEngine;
pub use engine::{EngineType, Observability, ValidationEngine};
pub use error::{OrchestrateError, Result};
pub use fetch::{FetchConfig, HttpResourceFetcher, ResourceFetcher};
pub use local::LocalRuleEngine;
pub use orchestrator::Orchestrator;
pub use outcome::{SourceLocation, ValidationIssue, ValidationResult};
pub use registry::{EngineKey, EngineRegistry};
pub use remote::{RemoteApiConfig, RemoteApiEngine};
pub use session::{Session, SessionBuilder};
pub use strategy::{StrategySelection, parse_strategy};
