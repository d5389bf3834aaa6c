//! Error taxonomy for the generation pipeline.
//!
//! Every failure that crosses a component boundary is a [`GenerationError`]:
//! a closed [`ErrorKind`] tag plus a shared payload (code, component, stage,
//! context, cause). Whether an error may be retried or substituted by a
//! fallback is decided by its kind alone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Boxed cause attached to a [`GenerationError`].
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage an error (or a partial-generation stage) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStage {
    Initialization,
    TemplateLoading,
    FrameworkProcessing,
    StepGeneration,
    Optimization,
    Rendering,
    Validation,
    Output,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStage::Initialization => "initialization",
            GenerationStage::TemplateLoading => "template-loading",
            GenerationStage::FrameworkProcessing => "framework-processing",
            GenerationStage::StepGeneration => "step-generation",
            GenerationStage::Optimization => "optimization",
            GenerationStage::Rendering => "rendering",
            GenerationStage::Validation => "validation",
            GenerationStage::Output => "output",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            GenerationStage::Initialization,
            GenerationStage::TemplateLoading,
            GenerationStage::FrameworkProcessing,
            GenerationStage::StepGeneration,
            GenerationStage::Optimization,
            GenerationStage::Rendering,
            GenerationStage::Validation,
            GenerationStage::Output,
        ]
    }
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of generation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TemplateLoad,
    TemplateCompilation,
    FrameworkData,
    StepGeneration,
    Optimization,
    Rendering,
    WorkflowValidation,
    Output,
}

impl ErrorKind {
    /// Whether errors of this kind are eligible for retry or fallback.
    pub fn recoverable(&self) -> bool {
        match self {
            ErrorKind::TemplateLoad
            | ErrorKind::TemplateCompilation
            | ErrorKind::FrameworkData
            | ErrorKind::StepGeneration
            | ErrorKind::Optimization
            | ErrorKind::WorkflowValidation => true,
            ErrorKind::Rendering | ErrorKind::Output => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TemplateLoad => "TemplateLoadError",
            ErrorKind::TemplateCompilation => "TemplateCompilationError",
            ErrorKind::FrameworkData => "FrameworkDataError",
            ErrorKind::StepGeneration => "StepGenerationError",
            ErrorKind::Optimization => "OptimizationError",
            ErrorKind::Rendering => "RenderingError",
            ErrorKind::WorkflowValidation => "WorkflowValidationError",
            ErrorKind::Output => "OutputError",
        }
    }

    /// Stage an error of this kind is attributed to unless stated otherwise.
    pub fn default_stage(&self) -> GenerationStage {
        match self {
            ErrorKind::TemplateLoad | ErrorKind::TemplateCompilation => {
                GenerationStage::TemplateLoading
            }
            ErrorKind::FrameworkData => GenerationStage::FrameworkProcessing,
            ErrorKind::StepGeneration => GenerationStage::StepGeneration,
            ErrorKind::Optimization => GenerationStage::Optimization,
            ErrorKind::Rendering => GenerationStage::Rendering,
            ErrorKind::WorkflowValidation => GenerationStage::Validation,
            ErrorKind::Output => GenerationStage::Output,
        }
    }

    fn default_code(&self) -> &'static str {
        match self {
            ErrorKind::TemplateLoad => "TEMPLATE_LOAD_FAILED",
            ErrorKind::TemplateCompilation => "TEMPLATE_COMPILATION_FAILED",
            ErrorKind::FrameworkData => "FRAMEWORK_DATA_INVALID",
            ErrorKind::StepGeneration => "STEP_GENERATION_FAILED",
            ErrorKind::Optimization => "OPTIMIZATION_FAILED",
            ErrorKind::Rendering => "RENDERING_FAILED",
            ErrorKind::WorkflowValidation => "WORKFLOW_VALIDATION_FAILED",
            ErrorKind::Output => "OUTPUT_FAILED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised anywhere in the generation pipeline.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct GenerationError {
    kind: ErrorKind,
    message: String,
    code: String,
    component: String,
    stage: GenerationStage,
    context: BTreeMap<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
    #[source]
    cause: Option<ErrorCause>,
}

impl GenerationError {
    /// Create an error of the given kind with the kind's default code and stage.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: kind.default_code().to_string(),
            component: "generator".to_string(),
            stage: kind.default_stage(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
            cause: None,
        }
    }

    pub fn template_load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TemplateLoad, message)
    }

    pub fn template_compilation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TemplateCompilation, message)
    }

    pub fn framework_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FrameworkData, message)
    }

    pub fn step_generation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StepGeneration, message)
    }

    pub fn optimization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Optimization, message)
    }

    pub fn rendering(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rendering, message)
    }

    pub fn workflow_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WorkflowValidation, message)
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Output, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_stage(mut self, stage: GenerationStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn stage(&self) -> GenerationStage {
        self.stage
    }

    pub fn context(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.context
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    pub fn recoverable(&self) -> bool {
        self.kind.recoverable()
    }

    /// Messages of this error and every cause below it, outermost first.
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = vec![self.message.clone()];
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            std::error::Error::source(self);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }

    /// Structured representation for log sinks.
    pub fn to_log_format(&self) -> ErrorLogRecord {
        ErrorLogRecord {
            kind: self.kind,
            message: self.message.clone(),
            code: self.code.clone(),
            component: self.component.clone(),
            stage: self.stage,
            recoverable: self.recoverable(),
            context: self.context.clone(),
            timestamp: self.timestamp,
            cause: self.cause.as_ref().map(|c| c.to_string()),
        }
    }

    /// Non-technical description of what went wrong.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::TemplateLoad => format!(
                "A workflow template could not be loaded: {}",
                self.message
            ),
            ErrorKind::TemplateCompilation => format!(
                "A workflow template is malformed and could not be used: {}",
                self.message
            ),
            ErrorKind::FrameworkData => format!(
                "The detected project information is incomplete or inconsistent: {}",
                self.message
            ),
            ErrorKind::StepGeneration => format!(
                "Some workflow steps could not be generated: {}",
                self.message
            ),
            ErrorKind::Optimization => format!(
                "The workflow could not be optimized; an unoptimized version can still be used: {}",
                self.message
            ),
            ErrorKind::Rendering => format!(
                "The workflow could not be written out as YAML: {}",
                self.message
            ),
            ErrorKind::WorkflowValidation => format!(
                "The generated workflow did not pass validation: {}",
                self.message
            ),
            ErrorKind::Output => format!(
                "The workflow file could not be saved: {}",
                self.message
            ),
        }
    }

    /// Concrete suggestions a user can act on.
    pub fn recovery_actions(&self) -> Vec<String> {
        let actions: &[&str] = match self.kind {
            ErrorKind::TemplateLoad => &[
                "Verify the template file exists at the specified path",
                "Check that the templates directory is configured correctly",
                "Enable generic templates so a built-in template can be used instead",
            ],
            ErrorKind::TemplateCompilation => &[
                "Check the template for YAML or JSON syntax errors",
                "Make sure every job declares at least one step",
                "Compare the template against a known-good template of the same kind",
            ],
            ErrorKind::FrameworkData => &[
                "Add explicit framework and language information to the README",
                "Review the detection result for missing or conflicting entries",
            ],
            ErrorKind::StepGeneration => &[
                "Check that the detected package manager and build tool are supported",
                "Provide a framework-specific template with custom steps",
            ],
            ErrorKind::Optimization => &[
                "Disable workflow optimization and generate an unoptimized workflow",
            ],
            ErrorKind::Rendering => &[
                "Report the problem together with the detection result that triggered it",
                "Try a simpler generic template tier",
            ],
            ErrorKind::WorkflowValidation => &[
                "Review the validation errors and adjust the template",
                "Disable template validation to inspect the raw output",
            ],
            ErrorKind::Output => &[
                "Check that the output directory exists and is writable",
                "Make sure no other process holds the workflow file open",
            ],
        };
        actions.iter().map(|a| a.to_string()).collect()
    }
}

/// Serializable form of a [`GenerationError`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorLogRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub code: String,
    pub component: String,
    pub stage: GenerationStage,
    pub recoverable: bool,
    pub context: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cause: Option<String>,
}

/// State of a partial generation run that stopped at a required stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialFailure {
    pub completed_stages: Vec<GenerationStage>,
    pub failed_stage: GenerationStage,
    pub warnings: Vec<String>,
}

/// Several generation errors reported together.
#[derive(Error, Debug, Clone, Default)]
#[error("{} generation error(s) occurred", .errors.len())]
pub struct AggregateGenerationError {
    errors: Vec<GenerationError>,
    partial: Option<PartialFailure>,
}

impl AggregateGenerationError {
    pub fn new(errors: Vec<GenerationError>) -> Self {
        Self {
            errors,
            partial: None,
        }
    }

    pub fn with_partial(mut self, partial: PartialFailure) -> Self {
        self.partial = Some(partial);
        self
    }

    pub fn errors(&self) -> &[GenerationError] {
        &self.errors
    }

    pub fn partial(&self) -> Option<&PartialFailure> {
        self.partial.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Group member errors by the stage they were raised in.
    pub fn errors_by_stage(&self) -> BTreeMap<GenerationStage, Vec<&GenerationError>> {
        let mut grouped: BTreeMap<GenerationStage, Vec<&GenerationError>> = BTreeMap::new();
        for error in &self.errors {
            grouped.entry(error.stage()).or_default().push(error);
        }
        grouped
    }

    pub fn recoverable_errors(&self) -> Vec<&GenerationError> {
        self.errors.iter().filter(|e| e.recoverable()).collect()
    }

    pub fn critical_errors(&self) -> Vec<&GenerationError> {
        self.errors.iter().filter(|e| !e.recoverable()).collect()
    }

    pub fn user_message(&self) -> String {
        let critical = self.critical_errors().len();
        let recoverable = self.recoverable_errors().len();
        match (critical, recoverable) {
            (0, 0) => "Workflow generation did not complete.".to_string(),
            (0, r) => format!(
                "Workflow generation hit {} recoverable problem(s); retrying or adjusting templates may help.",
                r
            ),
            (c, r) => format!(
                "Workflow generation failed with {} critical and {} recoverable problem(s).",
                c, r
            ),
        }
    }
}

impl From<GenerationError> for AggregateGenerationError {
    fn from(error: GenerationError) -> Self {
        Self::new(vec![error])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_is_fixed_per_kind() {
        assert!(GenerationError::template_load("x").recoverable());
        assert!(GenerationError::template_load("x")
            .with_stage(GenerationStage::Rendering)
            .recoverable());
        assert!(!GenerationError::rendering("x").recoverable());
        assert!(!GenerationError::output("x").recoverable());
    }

    #[test]
    fn test_defaults_follow_kind() {
        let err = GenerationError::step_generation("no steps");
        assert_eq!(err.stage(), GenerationStage::StepGeneration);
        assert_eq!(err.code(), "STEP_GENERATION_FAILED");
        assert_eq!(err.to_string(), "no steps");
    }

    #[test]
    fn test_log_format() {
        let err = GenerationError::template_load("missing react-nodejs")
            .with_component("template-fallback")
            .with_context("template", "react-nodejs");

        let record = err.to_log_format();
        assert_eq!(record.kind, ErrorKind::TemplateLoad);
        assert_eq!(record.component, "template-fallback");
        assert_eq!(record.stage, GenerationStage::TemplateLoading);
        assert!(record.recoverable);
        assert_eq!(record.context["template"], serde_json::json!("react-nodejs"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "template_load");
        assert_eq!(json["stage"], "template-loading");
    }

    #[test]
    fn test_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = GenerationError::template_load("could not read template").with_cause(io);

        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(
            err.cause_chain(),
            vec!["could not read template".to_string(), "no such file".to_string()]
        );
    }

    #[test]
    fn test_user_message_and_actions() {
        let err = GenerationError::template_load("react-nodejs");
        assert!(err.user_message().contains("could not be loaded"));
        assert!(err
            .recovery_actions()
            .iter()
            .any(|a| a.contains("template file exists")));
    }

    #[test]
    fn test_aggregate_partitions() {
        let aggregate = AggregateGenerationError::new(vec![
            GenerationError::template_load("a"),
            GenerationError::rendering("b"),
            GenerationError::template_compilation("c"),
        ]);

        assert_eq!(aggregate.len(), 3);
        assert_eq!(aggregate.recoverable_errors().len(), 2);
        assert_eq!(aggregate.critical_errors().len(), 1);

        let by_stage = aggregate.errors_by_stage();
        assert_eq!(by_stage[&GenerationStage::TemplateLoading].len(), 2);
        assert_eq!(by_stage[&GenerationStage::Rendering].len(), 1);
        assert!(aggregate.partial().is_none());
        assert_eq!(aggregate.to_string(), "3 generation error(s) occurred");
    }

    #[test]
    fn test_stage_serde_names() {
        let stage: GenerationStage = serde_json::from_str("\"step-generation\"").unwrap();
        assert_eq!(stage, GenerationStage::StepGeneration);
        assert_eq!(stage.to_string(), "step-generation");
    }
}
