//! Detection snapshot handed in by the README analyzer.
//!
//! These types are read-only input to template resolution. They are produced
//! elsewhere (evidence extraction and confidence scoring) and are only
//! inspected here, never modified.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};

/// Broad category a detected framework belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FrameworkCategory {
    Frontend,
    Backend,
    Fullstack,
    Mobile,
    Desktop,
    Library,
    Testing,
    BuildTool,
    #[default]
    #[serde(other)]
    Other,
}

impl FrameworkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Fullstack => "fullstack",
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
            Self::Library => "library",
            Self::Testing => "testing",
            Self::BuildTool => "build-tool",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "frontend" => Self::Frontend,
            "backend" => Self::Backend,
            "fullstack" => Self::Fullstack,
            "mobile" => Self::Mobile,
            "desktop" => Self::Desktop,
            "library" => Self::Library,
            "testing" => Self::Testing,
            "build-tool" | "build_tool" => Self::BuildTool,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for FrameworkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected framework.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameworkInfo {
    pub name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub category: FrameworkCategory,
}

impl FrameworkInfo {
    pub fn new(name: impl Into<String>, category: FrameworkCategory) -> Self {
        Self {
            name: name.into(),
            confidence: 1.0,
            evidence: Vec::new(),
            category,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }
}

/// A detected language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub primary: bool,
}

impl LanguageInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            confidence: 1.0,
            primary: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// A detected package manager (npm, cargo, pip, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageManagerInfo {
    pub name: String,
    #[serde(default)]
    pub confidence: f64,
}

/// A detected deployment target (docker, vercel, aws, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentTarget {
    pub platform: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Free-form project metadata extracted from the README.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Everything the analyzer detected about a project.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DetectionResult {
    #[serde(default)]
    pub frameworks: Vec<FrameworkInfo>,
    #[serde(default)]
    pub languages: Vec<LanguageInfo>,
    #[serde(default)]
    pub package_managers: Vec<PackageManagerInfo>,
    #[serde(default)]
    pub deployment_targets: Vec<DeploymentTarget>,
    #[serde(default)]
    pub project_metadata: ProjectMetadata,
}

impl DetectionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_framework(mut self, framework: FrameworkInfo) -> Self {
        self.frameworks.push(framework);
        self
    }

    pub fn with_language(mut self, language: LanguageInfo) -> Self {
        self.languages.push(language);
        self
    }

    /// Load a detection result from a JSON or YAML file.
    pub async fn from_file(path: &Path) -> GenerationResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GenerationError::framework_data(format!(
                "Failed to read detection result {}",
                path.display()
            ))
            .with_code("DETECTION_READ_FAILED")
            .with_context("path", path.display().to_string())
            .with_cause(e)
        })?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                GenerationError::framework_data("Detection result is not valid JSON").with_cause(e)
            })
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                GenerationError::framework_data("Detection result is not valid YAML").with_cause(e)
            })
        };
        parsed.map_err(|e| e.with_context("path", path.display().to_string()))
    }

    /// The language flagged as primary, or the most confident one.
    pub fn primary_language(&self) -> Option<&LanguageInfo> {
        self.languages.iter().find(|l| l.primary).or_else(|| {
            self.languages.iter().reduce(|best, l| {
                if l.confidence > best.confidence {
                    l
                } else {
                    best
                }
            })
        })
    }

    /// The most confident framework; the first one wins on ties.
    pub fn top_framework(&self) -> Option<&FrameworkInfo> {
        self.frameworks.iter().reduce(|best, f| {
            if f.confidence > best.confidence {
                f
            } else {
                best
            }
        })
    }

    pub fn has_framework(&self, name: &str) -> bool {
        self.frameworks
            .iter()
            .any(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn has_language(&self, name: &str) -> bool {
        self.languages
            .iter()
            .any(|l| l.name.eq_ignore_ascii_case(name))
    }

    pub fn has_category(&self, category: FrameworkCategory) -> bool {
        self.frameworks.iter().any(|f| f.category == category)
    }

    /// Highest framework confidence, or 0.0 when nothing was detected.
    pub fn max_framework_confidence(&self) -> f64 {
        self.frameworks
            .iter()
            .map(|f| f.confidence)
            .fold(0.0, f64::max)
    }
}
