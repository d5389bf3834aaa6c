//! Template definitions.
//!
//! Three template shapes exist, one per resolution kind:
//!
//! - [`WorkflowTemplate`]: a complete workflow with triggers, permissions and jobs
//! - [`FrameworkTemplate`]: framework-specific setup/build/test and custom steps
//! - [`LanguageTemplate`]: language toolchain setup/build/test steps
//!
//! Templates are stored as YAML or JSON documents and are immutable once
//! loaded; downstream compilation works on copies.

use std::collections::BTreeMap;

use cicd_core::FrameworkCategory;
use serde::{Deserialize, Serialize};

use crate::error::TemplateResult;

/// Category of template being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Workflow,
    Framework,
    Language,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Workflow => "workflow",
            TemplateKind::Framework => "framework",
            TemplateKind::Language => "language",
        }
    }

    /// Storage subdirectory holding templates of this kind.
    pub fn directory(&self) -> &'static str {
        match self {
            TemplateKind::Workflow => "workflows",
            TemplateKind::Framework => "frameworks",
            TemplateKind::Language => "languages",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "workflow" | "workflows" => Some(TemplateKind::Workflow),
            "framework" | "frameworks" => Some(TemplateKind::Framework),
            "language" | "languages" => Some(TemplateKind::Language),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            TemplateKind::Workflow,
            TemplateKind::Framework,
            TemplateKind::Language,
        ]
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a stored template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateKey {
    pub kind: TemplateKind,
    pub name: String,
}

impl TemplateKey {
    pub fn new(kind: TemplateKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Normalize a template name: lowercase, whitespace runs become `-`.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Serialization format of a stored template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    Yaml,
    Json,
}

impl TemplateFormat {
    /// File extensions probed for this format, in order.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            TemplateFormat::Yaml => &["yaml", "yml"],
            TemplateFormat::Json => &["json"],
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "yaml" | "yml" => Some(TemplateFormat::Yaml),
            "json" => Some(TemplateFormat::Json),
            _ => None,
        }
    }
}

/// A single workflow step.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StepTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl StepTemplate {
    /// A step that runs an action.
    pub fn uses(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            uses: Some(action.into()),
            ..Default::default()
        }
    }

    /// A step that runs a shell command.
    pub fn run(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            run: Some(command.into()),
            ..Default::default()
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Human-readable label for diagnostics.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.id.clone())
            .or_else(|| self.uses.clone())
            .unwrap_or_else(|| "<unnamed step>".to_string())
    }
}

/// Matrix build strategy.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MatrixStrategy {
    #[serde(default)]
    pub matrix: BTreeMap<String, Vec<serde_json::Value>>,
    #[serde(rename = "fail-fast", default, skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,
    #[serde(rename = "max-parallel", default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<u32>,
}

fn default_runner() -> String {
    "ubuntu-latest".to_string()
}

/// A job within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobTemplate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "runs-on", default = "default_runner")]
    pub runs_on: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MatrixStrategy>,
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepTemplate>,
}

impl JobTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            runs_on: default_runner(),
            needs: Vec::new(),
            permissions: BTreeMap::new(),
            strategy: None,
            condition: None,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: StepTemplate) -> Self {
        self.steps.push(step);
        self
    }

    pub fn needs(mut self, job: impl Into<String>) -> Self {
        self.needs.push(job.into());
        self
    }

    pub fn permission(mut self, scope: impl Into<String>, access: impl Into<String>) -> Self {
        self.permissions.insert(scope.into(), access.into());
        self
    }

    pub fn runs_on(mut self, runner: impl Into<String>) -> Self {
        self.runs_on = runner.into();
        self
    }

    pub fn strategy(mut self, strategy: MatrixStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Branch filter for push/pull_request triggers.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BranchFilter {
    #[serde(default)]
    pub branches: Vec<String>,
}

impl BranchFilter {
    pub fn branches(branches: &[&str]) -> Self {
        Self {
            branches: branches.iter().map(|b| b.to_string()).collect(),
        }
    }
}

/// Cron schedule trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CronSchedule {
    pub cron: String,
}

/// Events that start a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorkflowTriggers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<BranchFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<BranchFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<CronSchedule>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub workflow_dispatch: bool,
}

impl WorkflowTriggers {
    pub fn is_empty(&self) -> bool {
        self.push.is_none()
            && self.pull_request.is_none()
            && self.schedule.is_empty()
            && !self.workflow_dispatch
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowTemplate {
    /// Display name
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "on", default)]
    pub triggers: WorkflowTriggers,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub jobs: Vec<JobTemplate>,
}

impl WorkflowTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: default_version(),
            triggers: WorkflowTriggers::default(),
            permissions: BTreeMap::new(),
            env: BTreeMap::new(),
            jobs: Vec::new(),
        }
    }

    pub fn job(&self, id: &str) -> Option<&JobTemplate> {
        self.jobs.iter().find(|j| j.id == id)
    }
}

/// Cache configuration for dependency directories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheStrategy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restore_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Framework-specific steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameworkTemplate {
    /// Display name
    pub name: String,
    pub framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FrameworkCategory>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_steps: Vec<StepTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_steps: Vec<StepTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_steps: Vec<StepTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_steps: Vec<StepTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStrategy>,
}

impl FrameworkTemplate {
    pub fn steps(&self) -> impl Iterator<Item = &StepTemplate> {
        self.setup_steps
            .iter()
            .chain(&self.build_steps)
            .chain(&self.test_steps)
            .chain(&self.custom_steps)
    }
}

/// Language toolchain steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageTemplate {
    /// Display name
    pub name: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_steps: Vec<StepTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_steps: Vec<StepTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_steps: Vec<StepTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStrategy>,
}

impl LanguageTemplate {
    pub fn steps(&self) -> impl Iterator<Item = &StepTemplate> {
        self.setup_steps
            .iter()
            .chain(&self.build_steps)
            .chain(&self.test_steps)
    }
}

/// A resolved template of any kind.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Template {
    Workflow(WorkflowTemplate),
    Framework(FrameworkTemplate),
    Language(LanguageTemplate),
}

impl Template {
    /// Decode a stored document as a template of the given kind.
    pub fn decode(kind: TemplateKind, format: TemplateFormat, bytes: &[u8]) -> TemplateResult<Self> {
        let template = match (kind, format) {
            (TemplateKind::Workflow, TemplateFormat::Yaml) => {
                Template::Workflow(serde_yaml::from_slice(bytes)?)
            }
            (TemplateKind::Workflow, TemplateFormat::Json) => {
                Template::Workflow(serde_json::from_slice(bytes)?)
            }
            (TemplateKind::Framework, TemplateFormat::Yaml) => {
                Template::Framework(serde_yaml::from_slice(bytes)?)
            }
            (TemplateKind::Framework, TemplateFormat::Json) => {
                Template::Framework(serde_json::from_slice(bytes)?)
            }
            (TemplateKind::Language, TemplateFormat::Yaml) => {
                Template::Language(serde_yaml::from_slice(bytes)?)
            }
            (TemplateKind::Language, TemplateFormat::Json) => {
                Template::Language(serde_json::from_slice(bytes)?)
            }
        };
        Ok(template)
    }

    /// Display name of the template.
    pub fn name(&self) -> &str {
        match self {
            Template::Workflow(t) => &t.name,
            Template::Framework(t) => &t.name,
            Template::Language(t) => &t.name,
        }
    }

    pub fn kind(&self) -> TemplateKind {
        match self {
            Template::Workflow(_) => TemplateKind::Workflow,
            Template::Framework(_) => TemplateKind::Framework,
            Template::Language(_) => TemplateKind::Language,
        }
    }

    pub fn as_workflow(&self) -> Option<&WorkflowTemplate> {
        match self {
            Template::Workflow(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_framework(&self) -> Option<&FrameworkTemplate> {
        match self {
            Template::Framework(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_language(&self) -> Option<&LanguageTemplate> {
        match self {
            Template::Language(t) => Some(t),
            _ => None,
        }
    }

    pub fn to_yaml(&self) -> TemplateResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
