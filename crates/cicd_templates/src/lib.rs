//! # cicd_templates
//!
//! Template resolution for cicdgen.
//!
//! This crate finds the best template for whatever the README analyzer
//! detected, falling back through a hierarchy when the ideal template is
//! missing or broken:
//!
//! - **Store**: reads YAML/JSON template documents by kind and name
//! - **Cache**: loads each template at most once
//! - **Rules**: priority-ordered extra candidates driven by the detection result
//! - **Generic**: built-in templates at four complexity tiers, the last resort
//! - **Resolver**: ties the above together
//!
//! ## Example
//!
//! ```rust,no_run
//! use cicd_core::{FrameworkCategory, FrameworkInfo, LanguageInfo};
//! use cicd_templates::TemplateFallbackManager;
//!
//! # async fn run() {
//! let manager = TemplateFallbackManager::builder()
//!     .templates_dir("templates")
//!     .standard_rules()
//!     .build();
//!
//! let react = FrameworkInfo::new("react", FrameworkCategory::Frontend);
//! let node = LanguageInfo::new("nodejs").primary();
//!
//! let outcome = manager.get_framework_template(&react, &node).await;
//! for warning in &outcome.warnings {
//!     println!("warning: {}", warning);
//! }
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod generic;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod template;
pub mod validator;

pub use cache::{CacheEntry, CacheStats, TemplateCache};
pub use config::EngineConfig;
pub use error::{TemplateError, TemplateResult};
pub use generic::GenericTemplates;
pub use resolver::{
    framework_hierarchy, language_hierarchy, workflow_hierarchy, TemplateFallbackManager,
    TemplateFallbackManagerBuilder, TemplateOutcome,
};
pub use rules::{CustomCondition, FallbackRule, RuleCondition, RuleSet};
pub use store::{FsTemplateStore, MemoryTemplateStore, RawTemplate, TemplateStore, DEFAULT_TEMPLATES_DIR};
pub use template::{
    normalize_name, BranchFilter, CacheStrategy, CronSchedule, FrameworkTemplate, JobTemplate,
    LanguageTemplate, MatrixStrategy, StepTemplate, Template, TemplateFormat, TemplateKey,
    TemplateKind, WorkflowTemplate, WorkflowTriggers,
};
pub use validator::{TemplateValidator, ValidationResult};
