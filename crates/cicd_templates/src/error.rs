//! Error types for template storage and decoding.

use std::path::PathBuf;

use cicd_core::GenerationError;
use thiserror::Error;

use crate::template::TemplateKey;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors raised by template stores and decoders.
///
/// These never leave the crate's resolver boundary as-is: they are converted
/// into [`GenerationError`]s before being handed to callers.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(TemplateKey),

    #[error("Invalid template name '{0}'")]
    InvalidName(String),

    #[error("Invalid template {template}: {message}")]
    Invalid { template: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TemplateError {
    fn code(&self) -> &'static str {
        match self {
            TemplateError::NotFound(_) => "TEMPLATE_NOT_FOUND",
            TemplateError::InvalidName(_) => "TEMPLATE_NAME_INVALID",
            TemplateError::Invalid { .. } => "TEMPLATE_INVALID",
            TemplateError::Io { .. } => "TEMPLATE_READ_FAILED",
            TemplateError::Yaml(_) | TemplateError::Json(_) => "TEMPLATE_PARSE_FAILED",
        }
    }
}

impl From<TemplateError> for GenerationError {
    fn from(err: TemplateError) -> Self {
        let message = err.to_string();
        let code = err.code();
        let base = match &err {
            TemplateError::NotFound(_) | TemplateError::InvalidName(_) | TemplateError::Io { .. } => {
                GenerationError::template_load(message)
            }
            TemplateError::Invalid { .. } | TemplateError::Yaml(_) | TemplateError::Json(_) => {
                GenerationError::template_compilation(message)
            }
        };
        base.with_code(code)
            .with_component("template-store")
            .with_cause(err)
    }
}
