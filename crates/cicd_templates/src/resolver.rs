//! Hierarchical template resolution with fallbacks.
//!
//! The resolver handles:
//! - Building the ordered candidate list for a lookup (primary, rule matches,
//!   structural fallbacks, generic synthesis)
//! - Loading candidates through the cache or straight from the store
//! - Validating loaded templates
//! - Reporting which fallback was used

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use cicd_core::{
    DetectionResult, FallbackConfig, FallbackConfigUpdate, FrameworkInfo, GenerationError,
    GenerationResult, GenerationStage, GenericTier, LanguageInfo, Recovered,
};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, TemplateCache};
use crate::generic::GenericTemplates;
use crate::rules::{FallbackRule, RuleSet};
use crate::store::{FsTemplateStore, TemplateStore};
use crate::template::{normalize_name, Template, TemplateKey, TemplateKind};
use crate::validator::TemplateValidator;

const COMPONENT: &str = "template-fallback-manager";

/// Outcome of a template lookup.
#[derive(Debug, Clone)]
pub struct TemplateOutcome {
    pub success: bool,
    pub data: Option<Arc<Template>>,
    pub error: Option<GenerationError>,
    pub warnings: Vec<String>,
}

impl TemplateOutcome {
    fn resolved(template: Arc<Template>, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(template),
            error: None,
            warnings,
        }
    }

    fn failed(error: GenerationError, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            warnings,
        }
    }

    /// Convert into a `Result`, keeping the warnings on success.
    pub fn into_result(self) -> GenerationResult<Recovered<Arc<Template>>> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(Recovered {
                data,
                warnings: self.warnings,
            }),
            (None, Some(err)) => Err(err),
            (None, None) => Err(GenerationError::template_load("No template was resolved")
                .with_component(COMPONENT)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    Named(String),
    Generic(GenericTier),
}

impl Candidate {
    fn name(&self) -> String {
        match self {
            Candidate::Named(name) => name.clone(),
            Candidate::Generic(tier) => GenericTemplates::candidate_name(*tier),
        }
    }
}

/// Structural fallbacks for a framework lookup, primary first.
pub fn framework_hierarchy(
    framework: &FrameworkInfo,
    language: Option<&LanguageInfo>,
) -> Vec<String> {
    let framework_name = normalize_name(&framework.name);
    let category = framework.category.as_str();

    let Some(language) = language else {
        return vec![
            format!("{}-generic", framework_name),
            format!("{}-generic", category),
        ];
    };
    let language_name = normalize_name(&language.name);

    vec![
        format!("{}-{}", framework_name, language_name),
        format!("{}-generic", framework_name),
        format!("{}-{}", language_name, category),
        format!("{}-generic", language_name),
        format!("{}-generic", category),
    ]
}

/// Structural fallbacks for a language lookup, primary first.
pub fn language_hierarchy(language: &LanguageInfo) -> Vec<String> {
    let name = normalize_name(&language.name);
    let mut names = Vec::new();

    if let Some(version) = language.version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        names.push(format!("{}-{}", name, normalize_name(version)));
        if let Some((major, _)) = version.split_once('.') {
            names.push(format!("{}-{}", name, normalize_name(major)));
        }
    }
    names.push(format!("{}-latest", name));
    names.push(format!("{}-generic", name));
    names
}

/// Structural fallbacks for a workflow lookup.
pub fn workflow_hierarchy(detection: &DetectionResult) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(language) = detection.primary_language() {
        names.push(format!("{}-ci", normalize_name(&language.name)));
    }
    names.push("generic".to_string());
    names
}

/// Resolves templates through a fallback hierarchy.
///
/// Rules and configuration are fixed at construction through
/// [`TemplateFallbackManager::builder`]; lookups only need `&self`, so one
/// manager can be shared behind an `Arc`.
pub struct TemplateFallbackManager {
    store: Arc<dyn TemplateStore>,
    cache: TemplateCache,
    rules: RuleSet,
    config: FallbackConfig,
    validator: TemplateValidator,
}

impl std::fmt::Debug for TemplateFallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateFallbackManager")
            .field("store", &self.store.location())
            .field("rules", &self.rules.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for TemplateFallbackManager {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TemplateFallbackManager {
    pub fn builder() -> TemplateFallbackManagerBuilder {
        TemplateFallbackManagerBuilder::default()
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }

    /// Register an extra rule. Only valid while the manager is being configured.
    pub fn add_fallback_rule(&mut self, rule: FallbackRule) {
        self.rules.add(rule);
    }

    pub fn update_config(&mut self, update: FallbackConfigUpdate) {
        self.config.apply(update);
        debug!("Fallback config updated: {:?}", self.config);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Synthesized template for `tier`. Never cached, never fails.
    pub fn get_generic_template(&self, tier: GenericTier) -> Template {
        Template::Workflow(GenericTemplates::synthesize(tier))
    }

    /// Resolve `primary` of `kind`, falling back through rules and the
    /// structural hierarchy derived from `detection`.
    pub async fn get_template_with_fallback(
        &self,
        detection: &DetectionResult,
        kind: TemplateKind,
        primary: &str,
    ) -> TemplateOutcome {
        let structural = match kind {
            TemplateKind::Workflow => workflow_hierarchy(detection),
            TemplateKind::Framework => detection
                .top_framework()
                .map(|framework| framework_hierarchy(framework, detection.primary_language()))
                .unwrap_or_default(),
            TemplateKind::Language => detection
                .primary_language()
                .map(language_hierarchy)
                .unwrap_or_default(),
        };
        self.resolve(detection, kind, primary, structural).await
    }

    /// Resolve the framework template for `framework` built with `language`.
    pub async fn get_framework_template(
        &self,
        framework: &FrameworkInfo,
        language: &LanguageInfo,
    ) -> TemplateOutcome {
        let detection = DetectionResult::new()
            .with_framework(framework.clone())
            .with_language(language.clone());
        let mut hierarchy = framework_hierarchy(framework, Some(language));
        let primary = hierarchy.remove(0);
        self.resolve(&detection, TemplateKind::Framework, &primary, hierarchy)
            .await
    }

    /// Resolve the language template for `language`.
    pub async fn get_language_template(&self, language: &LanguageInfo) -> TemplateOutcome {
        let detection = DetectionResult::new().with_language(language.clone());
        let mut hierarchy = language_hierarchy(language);
        let primary = hierarchy.remove(0);
        self.resolve(&detection, TemplateKind::Language, &primary, hierarchy)
            .await
    }

    fn candidates(
        &self,
        detection: &DetectionResult,
        primary: &str,
        structural: Vec<String>,
    ) -> Vec<Candidate> {
        let mut ordered = vec![Candidate::Named(primary.to_string())];

        if self.config.enable_template_fallback {
            for rule in self.rules.matching(detection) {
                debug!("Rule '{}' matched, adding '{}'", rule.name, rule.fallback_template);
                ordered.push(Candidate::Named(normalize_name(&rule.fallback_template)));
            }
            ordered.extend(structural.iter().map(|n| Candidate::Named(normalize_name(n))));
            if self.config.enable_generic_templates {
                ordered.push(Candidate::Generic(self.config.generic_tier));
            }
        }

        let mut seen = HashSet::new();
        ordered.retain(|c| seen.insert(c.name()));
        ordered
    }

    async fn resolve(
        &self,
        detection: &DetectionResult,
        kind: TemplateKind,
        primary: &str,
        structural: Vec<String>,
    ) -> TemplateOutcome {
        let primary = normalize_name(primary);
        let candidates = self.candidates(detection, &primary, structural);

        let mut attempted = Vec::new();
        let mut last_error = None;

        for candidate in candidates {
            let name = candidate.name();
            attempted.push(name.clone());
            debug!("Trying {} template '{}'", kind, name);

            let loaded = match &candidate {
                Candidate::Named(name) => self.load(&TemplateKey::new(kind, name.as_str())).await,
                Candidate::Generic(tier) => Ok(Arc::new(self.get_generic_template(*tier))),
            };

            match loaded {
                Ok(template) => {
                    let mut warnings = Vec::new();
                    if name != primary {
                        warn!("Using fallback template '{}' for '{}'", name, primary);
                        warnings.push(format!(
                            "Used fallback template '{}' instead of '{}'",
                            name, primary
                        ));
                    }
                    info!("Resolved {} template '{}' as '{}'", kind, primary, template.name());
                    return TemplateOutcome::resolved(template, warnings);
                }
                Err(err) => {
                    debug!("Candidate '{}' failed: {}", name, err);
                    last_error = Some(err);
                }
            }
        }

        let mut err = GenerationError::template_load(format!(
            "No {} template could be loaded for '{}'",
            kind, primary
        ))
        .with_code("TEMPLATE_FALLBACK_EXHAUSTED")
        .with_component(COMPONENT)
        .with_stage(GenerationStage::TemplateLoading)
        .with_context("kind", kind.as_str())
        .with_context("primary", &primary)
        .with_context("attempted", &attempted);
        if let Some(cause) = last_error {
            err = err.with_cause(cause);
        }
        error!("{}", err);
        TemplateOutcome::failed(err, Vec::new())
    }

    async fn load(&self, key: &TemplateKey) -> GenerationResult<Arc<Template>> {
        if self.config.cache_templates {
            self.cache.get_or_load(key, || self.read_template(key)).await
        } else {
            self.read_template(key).await.map(Arc::new)
        }
    }

    async fn read_template(&self, key: &TemplateKey) -> GenerationResult<Template> {
        let raw = self.store.read(key).await?;
        let template = raw.decode().map_err(|e| {
            GenerationError::from(e).with_context("source", &raw.source)
        })?;

        if self.config.validate_templates {
            let result = self.validator.validate(&template);
            for warning in &result.warnings {
                debug!("Template {}: {}", key, warning);
            }
            if !result.valid {
                return Err(GenerationError::template_compilation(format!(
                    "Template {} failed validation: {}",
                    key,
                    result.errors.join("; ")
                ))
                .with_code("TEMPLATE_VALIDATION_FAILED")
                .with_component(COMPONENT)
                .with_context("source", &raw.source)
                .with_context("errors", &result.errors));
            }
        }

        Ok(template)
    }
}

/// Builder assembling a [`TemplateFallbackManager`] once.
#[derive(Default)]
pub struct TemplateFallbackManagerBuilder {
    store: Option<Arc<dyn TemplateStore>>,
    config: FallbackConfig,
    rules: RuleSet,
}

impl TemplateFallbackManagerBuilder {
    pub fn store(mut self, store: impl TemplateStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn TemplateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a filesystem store rooted at `dir`.
    pub fn templates_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.store(FsTemplateStore::new(dir))
    }

    pub fn config(mut self, config: FallbackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rule(mut self, rule: FallbackRule) -> Self {
        self.rules.add(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = FallbackRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Add the built-in category rules.
    pub fn standard_rules(mut self) -> Self {
        self.rules.extend(RuleSet::standard().rules().iter().cloned());
        self
    }

    pub fn build(self) -> TemplateFallbackManager {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FsTemplateStore::default()));
        info!(
            "Template fallback manager using {} with {} rule(s)",
            store.location(),
            self.rules.len()
        );
        TemplateFallbackManager {
            store,
            cache: TemplateCache::new(),
            rules: self.rules,
            config: self.config,
            validator: TemplateValidator::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCondition;
    use crate::store::MemoryTemplateStore;
    use cicd_core::{ErrorKind, FrameworkCategory};

    const REACT_GENERIC: &str = "name: React Generic\nframework: react\nbuild_steps:\n  - run: npm run build\n";

    fn react() -> FrameworkInfo {
        FrameworkInfo::new("React", FrameworkCategory::Frontend).with_confidence(0.9)
    }

    fn node() -> LanguageInfo {
        LanguageInfo::new("NodeJS").primary()
    }

    #[test]
    fn test_framework_hierarchy() {
        assert_eq!(
            framework_hierarchy(&react(), Some(&node())),
            vec![
                "react-nodejs",
                "react-generic",
                "nodejs-frontend",
                "nodejs-generic",
                "frontend-generic",
            ]
        );
        assert_eq!(
            framework_hierarchy(&react(), None),
            vec!["react-generic", "frontend-generic"]
        );
    }

    #[tokio::test]
    async fn test_framework_without_language_keeps_hierarchy() {
        let store = Arc::new(MemoryTemplateStore::new().with_yaml(
            TemplateKind::Framework,
            "react-generic",
            REACT_GENERIC,
        ));
        let manager = TemplateFallbackManager::builder()
            .shared_store(store.clone())
            .build();

        let detection = DetectionResult::new().with_framework(react());
        let outcome = manager
            .get_template_with_fallback(&detection, TemplateKind::Framework, "react-nodejs")
            .await;

        assert_eq!(outcome.data.unwrap().name(), "React Generic");
        assert_eq!(
            outcome.warnings,
            vec!["Used fallback template 'react-generic' instead of 'react-nodejs'".to_string()]
        );
        assert_eq!(store.read_count(TemplateKind::Framework, "react-generic"), 1);
    }

    #[test]
    fn test_language_hierarchy() {
        let python = LanguageInfo::new("Python").with_version("3.12");
        assert_eq!(
            language_hierarchy(&python),
            vec!["python-3.12", "python-3", "python-latest", "python-generic"]
        );

        let go = LanguageInfo::new("Go");
        assert_eq!(language_hierarchy(&go), vec!["go-latest", "go-generic"]);

        let java = LanguageInfo::new("Java").with_version("21");
        assert_eq!(
            language_hierarchy(&java),
            vec!["java-21", "java-latest", "java-generic"]
        );
    }

    #[test]
    fn test_workflow_hierarchy() {
        let detection = DetectionResult::new().with_language(LanguageInfo::new("Rust").primary());
        assert_eq!(workflow_hierarchy(&detection), vec!["rust-ci", "generic"]);
        assert_eq!(workflow_hierarchy(&DetectionResult::new()), vec!["generic"]);
    }

    #[tokio::test]
    async fn test_structural_fallback() {
        let store = MemoryTemplateStore::new().with_yaml(
            TemplateKind::Framework,
            "react-generic",
            REACT_GENERIC,
        );
        let manager = TemplateFallbackManager::builder().store(store).build();

        let outcome = manager.get_framework_template(&react(), &node()).await;
        assert!(outcome.success);
        assert_eq!(outcome.data.as_ref().unwrap().name(), "React Generic");
        assert_eq!(
            outcome.warnings,
            vec!["Used fallback template 'react-generic' instead of 'react-nodejs'".to_string()]
        );
    }

    #[tokio::test]
    async fn test_generic_synthesis_is_terminal() {
        let manager = TemplateFallbackManager::builder()
            .store(MemoryTemplateStore::new())
            .build();

        let outcome = manager
            .get_language_template(&LanguageInfo::new("Zig").with_version("0.13"))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap().name(), "Generic CI (basic)");
        assert!(outcome.warnings[0].contains("generic-basic"));
        // Synthesized templates are not cached.
        assert_eq!(manager.cache_stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_fallback_disabled_tries_primary_only() {
        let store = Arc::new(MemoryTemplateStore::new().with_yaml(
            TemplateKind::Framework,
            "react-generic",
            REACT_GENERIC,
        ));
        let mut manager = TemplateFallbackManager::builder()
            .shared_store(store.clone())
            .rule(FallbackRule::new("any", RuleCondition::Always, "react-generic", 10))
            .build();
        manager.update_config(FallbackConfigUpdate::new().template_fallback(false));

        let outcome = manager.get_framework_template(&react(), &node()).await;
        assert!(!outcome.success);
        assert_eq!(store.total_reads(), 1);

        let err = outcome.error.unwrap();
        assert_eq!(err.kind(), ErrorKind::TemplateLoad);
        assert_eq!(err.code(), "TEMPLATE_FALLBACK_EXHAUSTED");
        assert_eq!(err.context()["attempted"], serde_json::json!(["react-nodejs"]));
        assert!(err.cause().is_some());
    }

    #[tokio::test]
    async fn test_exhausted_lists_every_attempt() {
        let mut manager = TemplateFallbackManager::builder()
            .store(MemoryTemplateStore::new())
            .standard_rules()
            .build();
        manager.update_config(FallbackConfigUpdate::new().generic_templates(false));

        let result = manager
            .get_framework_template(&react(), &node())
            .await
            .into_result();
        let err = result.unwrap_err();
        assert_eq!(
            err.context()["attempted"],
            serde_json::json!([
                "react-nodejs",
                "frontend-generic",
                "react-generic",
                "nodejs-frontend",
                "nodejs-generic",
            ])
        );
        assert!(!err.recovery_actions().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_template_falls_through() {
        let store = MemoryTemplateStore::new()
            .with_yaml(TemplateKind::Framework, "react-nodejs", "name: Broken\nframework: react\n")
            .with_yaml(TemplateKind::Framework, "react-generic", REACT_GENERIC);
        let manager = TemplateFallbackManager::builder().store(store).build();

        let outcome = manager.get_framework_template(&react(), &node()).await;
        assert_eq!(outcome.data.unwrap().name(), "React Generic");
        assert_eq!(manager.cache_stats().entry_count, 1);
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let store = MemoryTemplateStore::new().with_yaml(
            TemplateKind::Framework,
            "react-nodejs",
            "name: Bare\nframework: react\n",
        );
        let manager = TemplateFallbackManager::builder()
            .store(store)
            .config(FallbackConfig {
                validate_templates: false,
                ..FallbackConfig::default()
            })
            .build();

        let outcome = manager.get_framework_template(&react(), &node()).await;
        assert_eq!(outcome.data.unwrap().name(), "Bare");
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_workflow_lookup_uses_primary_language() {
        let store = MemoryTemplateStore::new().with_yaml(
            TemplateKind::Workflow,
            "rust-ci",
            "name: Rust CI\non:\n  push:\n    branches: [main]\njobs:\n  - id: test\n    steps:\n      - run: cargo test\n",
        );
        let manager = TemplateFallbackManager::builder().store(store).build();
        let detection = DetectionResult::new().with_language(LanguageInfo::new("Rust").primary());

        let outcome = manager
            .get_template_with_fallback(&detection, TemplateKind::Workflow, "Rust Release")
            .await;
        assert_eq!(outcome.data.unwrap().name(), "Rust CI");
        assert_eq!(
            outcome.warnings,
            vec!["Used fallback template 'rust-ci' instead of 'rust-release'".to_string()]
        );
    }
}
