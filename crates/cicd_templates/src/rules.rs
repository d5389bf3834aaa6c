//! Fallback rules.
//!
//! A fallback rule contributes an extra candidate template when its condition
//! holds for the detection result. Rules are consulted in descending priority;
//! rules with equal priority keep their registration order.

use std::fmt;
use std::sync::Arc;

use cicd_core::{DetectionResult, FrameworkCategory};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Predicate over a detection result supplied by code rather than config.
#[derive(Clone)]
pub struct CustomCondition(Arc<dyn Fn(&DetectionResult) -> bool + Send + Sync>);

impl CustomCondition {
    pub fn new(f: impl Fn(&DetectionResult) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomCondition(..)")
    }
}

/// When a fallback rule applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleCondition {
    Always,
    FrameworkDetected(String),
    LanguageDetected(String),
    CategoryDetected(FrameworkCategory),
    /// No detected framework reaches the given confidence
    ConfidenceBelow(f64),
    All(Vec<RuleCondition>),
    Any(Vec<RuleCondition>),
    #[serde(skip)]
    Custom(CustomCondition),
}

impl RuleCondition {
    pub fn custom(f: impl Fn(&DetectionResult) -> bool + Send + Sync + 'static) -> Self {
        RuleCondition::Custom(CustomCondition::new(f))
    }

    pub fn evaluate(&self, detection: &DetectionResult) -> bool {
        match self {
            RuleCondition::Always => true,
            RuleCondition::FrameworkDetected(name) => detection.has_framework(name),
            RuleCondition::LanguageDetected(name) => detection.has_language(name),
            RuleCondition::CategoryDetected(category) => detection.has_category(*category),
            RuleCondition::ConfidenceBelow(threshold) => {
                detection.max_framework_confidence() < *threshold
            }
            RuleCondition::All(conditions) => conditions.iter().all(|c| c.evaluate(detection)),
            RuleCondition::Any(conditions) => conditions.iter().any(|c| c.evaluate(detection)),
            RuleCondition::Custom(custom) => (custom.0)(detection),
        }
    }
}

/// A rule that contributes a fallback template candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackRule {
    pub name: String,
    pub condition: RuleCondition,
    pub fallback_template: String,
    #[serde(default)]
    pub priority: i32,
}

impl FallbackRule {
    pub fn new(
        name: impl Into<String>,
        condition: RuleCondition,
        fallback_template: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            condition,
            fallback_template: fallback_template.into(),
            priority,
        }
    }

    pub fn matches(&self, detection: &DetectionResult) -> bool {
        self.condition.evaluate(detection)
    }
}

/// Ordered collection of fallback rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<FallbackRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rules mapping framework categories to category templates.
    pub fn standard() -> Self {
        let mut set = Self::new();
        set.add(FallbackRule::new(
            "frontend-category",
            RuleCondition::CategoryDetected(FrameworkCategory::Frontend),
            "frontend-generic",
            5,
        ));
        set.add(FallbackRule::new(
            "backend-category",
            RuleCondition::CategoryDetected(FrameworkCategory::Backend),
            "backend-generic",
            5,
        ));
        set.add(FallbackRule::new(
            "fullstack-category",
            RuleCondition::CategoryDetected(FrameworkCategory::Fullstack),
            "fullstack-generic",
            5,
        ));
        set.add(FallbackRule::new(
            "low-confidence",
            RuleCondition::ConfidenceBelow(0.5),
            "generic",
            1,
        ));
        set
    }

    pub fn add(&mut self, rule: FallbackRule) {
        debug!(
            "Registering fallback rule '{}' -> '{}' (priority {})",
            rule.name, rule.fallback_template, rule.priority
        );
        self.rules.push(rule);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = FallbackRule>) {
        for rule in rules {
            self.add(rule);
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in registration order.
    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// Rules matching `detection`, highest priority first, stable on ties.
    pub fn matching(&self, detection: &DetectionResult) -> Vec<&FallbackRule> {
        let mut matched: Vec<&FallbackRule> =
            self.rules.iter().filter(|r| r.matches(detection)).collect();
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cicd_core::{FrameworkInfo, LanguageInfo};

    fn detection() -> DetectionResult {
        DetectionResult::new()
            .with_framework(FrameworkInfo::new("React", FrameworkCategory::Frontend).with_confidence(0.4))
            .with_language(LanguageInfo::new("JavaScript").primary())
    }

    #[test]
    fn test_priority_order() {
        let mut set = RuleSet::new();
        set.add(FallbackRule::new("low", RuleCondition::Always, "low-template", 1));
        set.add(FallbackRule::new("high", RuleCondition::Always, "high-template", 10));

        let names: Vec<_> = set
            .matching(&detection())
            .iter()
            .map(|r| r.fallback_template.as_str())
            .collect();
        assert_eq!(names, vec!["high-template", "low-template"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let mut set = RuleSet::new();
        for name in ["first", "second", "third"] {
            set.add(FallbackRule::new(name, RuleCondition::Always, name, 3));
        }
        let names: Vec<_> = set.matching(&detection()).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_conditions() {
        let d = detection();
        assert!(RuleCondition::FrameworkDetected("react".into()).evaluate(&d));
        assert!(!RuleCondition::LanguageDetected("python".into()).evaluate(&d));
        assert!(RuleCondition::ConfidenceBelow(0.5).evaluate(&d));
        assert!(RuleCondition::All(vec![
            RuleCondition::CategoryDetected(FrameworkCategory::Frontend),
            RuleCondition::LanguageDetected("javascript".into()),
        ])
        .evaluate(&d));
        assert!(!RuleCondition::Any(vec![]).evaluate(&d));
        assert!(RuleCondition::custom(|d| d.frameworks.len() == 1).evaluate(&d));
    }

    #[test]
    fn test_standard_rules() {
        let set = RuleSet::standard();
        let matched: Vec<_> = set
            .matching(&detection())
            .iter()
            .map(|r| r.fallback_template.as_str())
            .collect();
        assert_eq!(matched, vec!["frontend-generic", "generic"]);
    }

    #[test]
    fn test_rules_from_yaml() {
        let yaml = r#"
- name: django-backend
  condition:
    type: framework_detected
    value: django
  fallback_template: python-backend
  priority: 7
- name: anything
  condition:
    type: always
  fallback_template: generic
"#;
        let rules: Vec<FallbackRule> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].priority, 7);
        assert_eq!(rules[1].priority, 0);
        assert!(matches!(rules[1].condition, RuleCondition::Always));
    }
}
