//! Engine-selection strategy descriptors.
//!
//! Callers (typically a request header) can name the engines a session
//! should run as a small JSON document:
//!
//! ```json
//! {"engines": ["HAPI", "HL7-Official-API", "HL7-Official-Embedded"]}
//! ```
//!
//! Parsing never fails: every malformed shape and unrecognized identifier
//! becomes a human-readable diagnostic, and processing continues past it so
//! one bad entry cannot discard the rest of the selection.

use serde_json::Value;

use crate::engine::EngineType;

/// Outcome of parsing a strategy descriptor: the recognized selections in
/// descriptor order, plus diagnostics for everything that was not usable.
#[derive(Debug, Clone, Default)]
pub struct StrategySelection {
    pub engines: Vec<EngineType>,
    pub diagnostics: Vec<String>,
    /// Whether the descriptor carried a usable `engines` list at all. The
    /// session builder only honors `clear_existing` when it did, so a
    /// malformed descriptor cannot wipe explicitly added engines.
    pub has_engine_list: bool,
}

/// Parse an engine-selection descriptor.
///
/// Pure function of the descriptor text; the session builder applies the
/// result (and its `clear_existing` flag) to the engine list.
pub fn parse_strategy(descriptor: &str) -> StrategySelection {
    let mut selection = StrategySelection::default();

    let root: Value = match serde_json::from_str(descriptor) {
        Ok(root) => root,
        Err(error) => {
            selection.diagnostics.push(format!(
                "error parsing strategy descriptor `{descriptor}`: {error}"
            ));
            return selection;
        }
    };

    let Some(mapping) = root.as_object() else {
        selection
            .diagnostics
            .push(format!("strategy descriptor `{descriptor}` is not a mapping"));
        return selection;
    };

    let Some(Value::Array(engines)) = mapping.get("engines") else {
        selection.diagnostics.push(format!(
            "strategy descriptor `engines` key not found in `{descriptor}`"
        ));
        return selection;
    };
    selection.has_engine_list = true;

    for entry in engines {
        // Non-string entries are skipped without comment, matching the
        // lenient treatment of caller-supplied headers.
        let Some(name) = entry.as_str() else { continue };
        match name.parse::<EngineType>() {
            Ok(engine_type) => selection.engines.push(engine_type),
            Err(_) => selection
                .diagnostics
                .push(format!("strategy engine `{name}` was not recognized")),
        }
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_selection_in_order() {
        let selection =
            parse_strategy(r#"{"engines": ["HAPI", "HL7-Official-API", "HL7-Official-Embedded"]}"#);
        assert_eq!(
            selection.engines,
            vec![
                EngineType::LocalRule,
                EngineType::RemoteApi,
                EngineType::EmbeddedReference,
            ]
        );
        assert!(selection.diagnostics.is_empty());
    }

    #[test]
    fn test_unrecognized_identifier_is_diagnosed_and_skipped() {
        let selection = parse_strategy(r#"{"engines": ["HAPI", "BOGUS"]}"#);
        assert_eq!(selection.engines, vec![EngineType::LocalRule]);
        assert_eq!(selection.diagnostics.len(), 1);
        assert!(selection.diagnostics[0].contains("BOGUS"));
    }

    #[test]
    fn test_not_a_mapping() {
        let selection = parse_strategy(r#"["HAPI"]"#);
        assert!(selection.engines.is_empty());
        assert_eq!(selection.diagnostics.len(), 1);
        assert!(selection.diagnostics[0].contains("not a mapping"));
    }

    #[test]
    fn test_missing_engines_key() {
        let selection = parse_strategy(r#"{"validators": ["HAPI"]}"#);
        assert!(selection.engines.is_empty());
        assert!(!selection.has_engine_list);
        assert_eq!(selection.diagnostics.len(), 1);
        assert!(selection.diagnostics[0].contains("`engines` key not found"));
    }

    #[test]
    fn test_parse_failure_is_diagnosed() {
        let selection = parse_strategy("{engines: HAPI");
        assert!(selection.engines.is_empty());
        assert_eq!(selection.diagnostics.len(), 1);
        assert!(selection.diagnostics[0].contains("error parsing strategy descriptor"));
    }

    #[test]
    fn test_non_string_entries_are_skipped() {
        let selection = parse_strategy(r#"{"engines": [42, "HAPI", null]}"#);
        assert_eq!(selection.engines, vec![EngineType::LocalRule]);
        assert!(selection.diagnostics.is_empty());
    }

    #[test]
    fn test_duplicate_identifiers_select_twice() {
        let selection = parse_strategy(r#"{"engines": ["HAPI", "HAPI"]}"#);
        assert_eq!(
            selection.engines,
            vec![EngineType::LocalRule, EngineType::LocalRule]
        );
    }
}
