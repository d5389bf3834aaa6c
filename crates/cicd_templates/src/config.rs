//! Engine configuration file.

use std::path::{Path, PathBuf};

use cicd_core::{ErrorRecovery, FallbackConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::resolver::TemplateFallbackManager;
use crate::rules::FallbackRule;
use crate::store::DEFAULT_TEMPLATES_DIR;

fn default_templates_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TEMPLATES_DIR)
}

/// Settings for the resolver and the recovery layer, usually read from YAML.
///
/// ```yaml
/// templates_dir: ./templates
/// fallback:
///   validate_templates: false
///   generic_tier: standard
/// retry:
///   max_attempts: 5
/// rules:
///   - name: django
///     condition: { type: framework_detected, value: django }
///     fallback_template: python-backend
///     priority: 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rules: Vec<FallbackRule>,
    /// Also register the built-in category rules
    #[serde(default)]
    pub standard_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            fallback: FallbackConfig::default(),
            retry: RetryConfig::default(),
            rules: Vec::new(),
            standard_rules: false,
        }
    }
}

impl EngineConfig {
    /// Load a configuration file. A relative `templates_dir` is resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> TemplateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: EngineConfig = serde_yaml::from_str(&content)?;

        if config.templates_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.templates_dir = parent.join(&config.templates_dir);
            }
        }

        if config.retry.max_attempts == 0 {
            return Err(TemplateError::Invalid {
                template: path.display().to_string(),
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }

        debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    /// Build a resolver over a filesystem store at `templates_dir`.
    pub fn build_manager(&self) -> TemplateFallbackManager {
        let mut builder = TemplateFallbackManager::builder()
            .templates_dir(&self.templates_dir)
            .config(self.fallback.clone());
        if self.standard_rules {
            builder = builder.standard_rules();
        }
        builder.rules(self.rules.iter().cloned()).build()
    }

    /// Recovery layer sharing this configuration.
    pub fn recovery(&self) -> ErrorRecovery {
        ErrorRecovery::new(self.retry.clone(), self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cicd_core::{FrameworkCategory, FrameworkInfo, GenericTier, LanguageInfo};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.templates_dir, PathBuf::from("templates"));
        assert!(!config.standard_rules);
        assert!(config.build_manager().rules().is_empty());

        let config = EngineConfig {
            standard_rules: true,
            ..EngineConfig::default()
        };
        assert_eq!(config.build_manager().rules().len(), 4);
    }

    #[tokio::test]
    async fn test_default_config_prefers_framework_generic() {
        let temp = tempdir().unwrap();
        let frameworks = temp.path().join("frameworks");
        fs::create_dir_all(&frameworks).unwrap();
        fs::write(
            frameworks.join("react-generic.yaml"),
            "name: React Generic\nframework: react\nbuild_steps:\n  - run: npm run build\n",
        )
        .unwrap();
        fs::write(
            frameworks.join("frontend-generic.yaml"),
            "name: Frontend Generic\nframework: frontend\nbuild_steps:\n  - run: npm run build\n",
        )
        .unwrap();

        let manager = EngineConfig::default()
            .with_templates_dir(temp.path())
            .build_manager();
        let outcome = manager
            .get_framework_template(
                &FrameworkInfo::new("react", FrameworkCategory::Frontend).with_confidence(0.9),
                &LanguageInfo::new("nodejs").primary(),
            )
            .await;

        assert_eq!(outcome.data.unwrap().name(), "React Generic");
        assert!(outcome.warnings[0].contains("'react-generic'"));
    }

    #[test]
    fn test_from_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cicdgen.yaml");
        fs::write(
            &path,
            r#"
templates_dir: my-templates
standard_rules: false
fallback:
  cache_templates: false
  generic_tier: comprehensive
retry:
  max_attempts: 5
rules:
  - name: django
    condition:
      type: framework_detected
      value: django
    fallback_template: python-backend
    priority: 10
"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.templates_dir, temp.path().join("my-templates"));
        assert!(!config.fallback.cache_templates);
        assert!(config.fallback.validate_templates);
        assert_eq!(config.fallback.generic_tier, GenericTier::Comprehensive);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);

        let manager = config.build_manager();
        assert_eq!(manager.rules().len(), 1);
        assert_eq!(config.recovery().retry_config().max_attempts, 5);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.yaml");
        fs::write(&path, "retry:\n  max_attempts: 0\n").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(TemplateError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/cicdgen.yaml")).unwrap_err();
        assert!(matches!(err, TemplateError::Io { .. }));
    }
}
