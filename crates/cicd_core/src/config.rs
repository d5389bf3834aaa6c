//! Retry and fallback configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GenerationStage;

/// Complexity tier of a synthesized generic template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenericTier {
    Minimal,
    #[default]
    Basic,
    Standard,
    Comprehensive,
}

impl GenericTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenericTier::Minimal => "minimal",
            GenericTier::Basic => "basic",
            GenericTier::Standard => "standard",
            GenericTier::Comprehensive => "comprehensive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "minimal" => Some(GenericTier::Minimal),
            "basic" => Some(GenericTier::Basic),
            "standard" => Some(GenericTier::Standard),
            "comprehensive" => Some(GenericTier::Comprehensive),
            _ => None,
        }
    }

    /// All tiers, least complex first.
    pub fn all() -> Vec<Self> {
        vec![
            GenericTier::Minimal,
            GenericTier::Basic,
            GenericTier::Standard,
            GenericTier::Comprehensive,
        ]
    }
}

impl std::fmt::Display for GenericTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retryable_stages() -> HashSet<GenerationStage> {
    [
        GenerationStage::TemplateLoading,
        GenerationStage::FrameworkProcessing,
        GenerationStage::StepGeneration,
        GenerationStage::Optimization,
    ]
    .into_iter()
    .collect()
}

/// Retry policy for [`ErrorRecovery::with_retry`](crate::recovery::ErrorRecovery::with_retry).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Factor applied to the delay after every failed attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Stages whose operations may be retried
    #[serde(default = "default_retryable_stages")]
    pub retryable_stages: HashSet<GenerationStage>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            retryable_stages: default_retryable_stages(),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn retryable_stages(mut self, stages: impl IntoIterator<Item = GenerationStage>) -> Self {
        self.retryable_stages = stages.into_iter().collect();
        self
    }

    pub fn is_retryable(&self, stage: GenerationStage) -> bool {
        self.retryable_stages.contains(&stage)
    }

    /// Wait before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

fn default_true() -> bool {
    true
}

/// Switches for the fallback and partial-generation machinery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enable_template_fallback: bool,
    #[serde(default = "default_true")]
    pub enable_partial_generation: bool,
    #[serde(default = "default_true")]
    pub enable_generic_templates: bool,
    #[serde(default = "default_true")]
    pub cache_templates: bool,
    #[serde(default = "default_true")]
    pub validate_templates: bool,
    /// Tier synthesized when every named template failed
    #[serde(default)]
    pub generic_tier: GenericTier,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enable_template_fallback: true,
            enable_partial_generation: true,
            enable_generic_templates: true,
            cache_templates: true,
            validate_templates: true,
            generic_tier: GenericTier::default(),
        }
    }
}

impl FallbackConfig {
    /// Apply a partial update, leaving unspecified fields untouched.
    pub fn apply(&mut self, update: FallbackConfigUpdate) {
        if let Some(v) = update.enable_template_fallback {
            self.enable_template_fallback = v;
        }
        if let Some(v) = update.enable_partial_generation {
            self.enable_partial_generation = v;
        }
        if let Some(v) = update.enable_generic_templates {
            self.enable_generic_templates = v;
        }
        if let Some(v) = update.cache_templates {
            self.cache_templates = v;
        }
        if let Some(v) = update.validate_templates {
            self.validate_templates = v;
        }
        if let Some(v) = update.generic_tier {
            self.generic_tier = v;
        }
    }
}

/// Partial [`FallbackConfig`] used by `update_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfigUpdate {
    pub enable_template_fallback: Option<bool>,
    pub enable_partial_generation: Option<bool>,
    pub enable_generic_templates: Option<bool>,
    pub cache_templates: Option<bool>,
    pub validate_templates: Option<bool>,
    pub generic_tier: Option<GenericTier>,
}

impl FallbackConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template_fallback(mut self, enabled: bool) -> Self {
        self.enable_template_fallback = Some(enabled);
        self
    }

    pub fn partial_generation(mut self, enabled: bool) -> Self {
        self.enable_partial_generation = Some(enabled);
        self
    }

    pub fn generic_templates(mut self, enabled: bool) -> Self {
        self.enable_generic_templates = Some(enabled);
        self
    }

    pub fn cache_templates(mut self, enabled: bool) -> Self {
        self.cache_templates = Some(enabled);
        self
    }

    pub fn validate_templates(mut self, enabled: bool) -> Self {
        self.validate_templates = Some(enabled);
        self
    }

    pub fn generic_tier(mut self, tier: GenericTier) -> Self {
        self.generic_tier = Some(tier);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delays() {
        let config = RetryConfig::new()
            .base_delay(Duration::from_millis(100))
            .backoff_multiplier(2.0);

        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_base_delay_saturates() {
        let config = RetryConfig::new().base_delay(Duration::MAX);
        assert_eq!(config.base_delay_ms, u64::MAX);
    }

    #[test]
    fn test_default_retryable_stages() {
        let config = RetryConfig::default();
        assert!(config.is_retryable(GenerationStage::TemplateLoading));
        assert!(!config.is_retryable(GenerationStage::Rendering));
        assert!(!config.is_retryable(GenerationStage::Output));
    }

    #[test]
    fn test_partial_update() {
        let mut config = FallbackConfig::default();
        config.apply(
            FallbackConfigUpdate::new()
                .cache_templates(false)
                .generic_tier(GenericTier::Comprehensive),
        );

        assert!(!config.cache_templates);
        assert!(config.enable_template_fallback);
        assert_eq!(config.generic_tier, GenericTier::Comprehensive);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: FallbackConfig = serde_yaml::from_str("validate_templates: false").unwrap();
        assert!(!config.validate_templates);
        assert!(config.enable_generic_templates);
        assert_eq!(config.generic_tier, GenericTier::Basic);

        let retry: RetryConfig =
            serde_yaml::from_str("max_attempts: 5\nretryable_stages: [rendering]").unwrap();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay_ms, 1000);
        assert!(retry.is_retryable(GenerationStage::Rendering));
    }

    #[test]
    fn test_tier_ordering() {
        assert!(GenericTier::Minimal < GenericTier::Comprehensive);
        assert_eq!(GenericTier::from_str("Standard"), Some(GenericTier::Standard));
        assert_eq!(GenericTier::from_str("huge"), None);
    }
}
