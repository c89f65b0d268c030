//! Error types for folio operations

use crate::document::DocRef;
use serde::Serialize;

/// Structured error payload printed by the CLI in JSON mode.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("Parameter substitution failed: pattern has {placeholders} placeholder(s) but {parameters} parameter(s) were given")]
    Substitution {
        placeholders: usize,
        parameters: usize,
    },

    #[error("Cannot resolve property {xpath}: {message}")]
    PropertyResolution { xpath: String, message: String },

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("Unsupported query operator: {0}")]
    UnsupportedOperator(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocRef),

    #[error("Permission denied: {principal} cannot read {doc}")]
    PermissionDenied { principal: String, doc: DocRef },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Fixture parse error: {0}")]
    FixtureParse(String),

    #[error("Unknown query provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FolioError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::Substitution { .. } => "substitution",
            Self::PropertyResolution { .. } => "property_resolution",
            Self::UnknownSchema(_) => "unknown_schema",
            Self::UnsupportedOperator(_) => "unsupported_operator",
            Self::DocumentNotFound(_) => "document_not_found",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Repository(_) => "repository",
            Self::ConfigParse(_) => "config_parse",
            Self::FixtureParse(_) => "fixture_parse",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidDate(_) => "invalid_date",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        let hint = match self {
            Self::Substitution { .. } => "Pass exactly one parameter per '?' placeholder",
            Self::UnknownProvider(_) => "Check the [[providers]] entries of the config file",
            Self::ConfigParse(_) => "Run 'folio config' to see the expected layout",
            Self::InvalidArgument(_) => "Run 'folio --help' for usage",
            Self::DocumentNotFound(_) | Self::PermissionDenied { .. } => {
                "Check the document path and the user's read access"
            }
            _ => "",
        };
        ErrorEnvelope::new(self.code(), self.to_string(), hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution_message() {
        let err = FolioError::Substitution {
            placeholders: 2,
            parameters: 1,
        };
        assert!(err.to_string().contains("2 placeholder(s)"));
        assert_eq!(err.code(), "substitution");
    }

    #[test]
    fn test_envelope_carries_hint() {
        let err = FolioError::UnknownProvider("recent".to_string());
        let envelope = err.to_envelope();
        assert_eq!(envelope.code, "unknown_provider");
        assert!(envelope.message.contains("recent"));
        assert!(!envelope.hint.is_empty());
    }
}
