use thiserror::Error;

/// Main error type for the orchestration core.
///
/// Only `Config` is ever allowed to escape a public operation: an unknown
/// engine identifier is a fatal misconfiguration. Every other variant is an
/// internal failure mode that the engines recover from and surface as data
/// (a FATAL-severity issue inside a `ValidationResult`).
#[derive(Error, Debug)]
pub enum OrchestrateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("reference resource parsing error: {url} - {details}")]
    ResourceParse { url: String, details: String },

    #[error("payload parsing error: {details}")]
    PayloadParse { details: String },

    #[error("remote response parsing error: {details}")]
    RemoteParse { details: String },
}

impl OrchestrateError {
    /// Short kind name used as the diagnostics slot of a synthesized
    /// FATAL issue location.
    pub fn kind_name(&self) -> &'static str {
        match self {
            OrchestrateError::Config(_) => "ConfigurationError",
            OrchestrateError::Http(_) => "HttpTransportError",
            OrchestrateError::HttpStatus { .. } => "HttpStatusError",
            OrchestrateError::ResourceParse { .. } => "ResourceParseError",
            OrchestrateError::PayloadParse { .. } => "PayloadParseError",
            OrchestrateError::RemoteParse { .. } => "RemoteParseError",
        }
    }
}

impl From<serde_json::Error> for OrchestrateError {
    fn from(err: serde_json::Error) -> Self {
        OrchestrateError::PayloadParse {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, OrchestrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = OrchestrateError::Config("unknown validation engine type: `BOGUS`".to_string());
        assert!(error.to_string().contains("configuration error"));
        assert!(error.to_string().contains("BOGUS"));
    }

    #[test]
    fn test_http_status_error_display() {
        let error = OrchestrateError::HttpStatus {
            url: "http://example.com/profile.json".to_string(),
            status: 404,
        };
        assert!(error.to_string().contains("404"));
        assert!(error.to_string().contains("http://example.com/profile.json"));
    }

    #[test]
    fn test_kind_names() {
        let parse = OrchestrateError::PayloadParse {
            details: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(parse.kind_name(), "PayloadParseError");

        let config = OrchestrateError::Config("bad".to_string());
        assert_eq!(config.kind_name(), "ConfigurationError");
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: OrchestrateError = json_err.into();
        match error {
            OrchestrateError::PayloadParse { .. } => (),
            other => panic!("expected PayloadParse, got {other:?}"),
        }
    }
}
