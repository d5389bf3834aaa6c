//! Structural validation of decoded templates.

use std::collections::HashSet;

use serde::Serialize;

use crate::template::{CacheStrategy, StepTemplate, Template, WorkflowTemplate};

/// Validation result for a template.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub template: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
        self.valid = false;
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Checks that a template is usable before it is cached.
#[derive(Debug, Clone, Default)]
pub struct TemplateValidator;

impl TemplateValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, template: &Template) -> ValidationResult {
        let mut result = ValidationResult::new(template.name());

        if template.name().trim().is_empty() {
            result.add_error("Template name is empty");
        }

        match template {
            Template::Workflow(workflow) => self.validate_workflow(workflow, &mut result),
            Template::Framework(framework) => {
                if framework.framework.trim().is_empty() {
                    result.add_error("Framework template does not name a framework");
                }
                self.validate_steps("framework", framework.steps(), &mut result);
                if let Some(cache) = &framework.cache {
                    self.validate_cache(cache, &mut result);
                }
            }
            Template::Language(language) => {
                if language.language.trim().is_empty() {
                    result.add_error("Language template does not name a language");
                }
                self.validate_steps("language", language.steps(), &mut result);
                if let Some(cache) = &language.cache {
                    self.validate_cache(cache, &mut result);
                }
            }
        }

        result
    }

    fn validate_workflow(&self, workflow: &WorkflowTemplate, result: &mut ValidationResult) {
        if workflow.jobs.is_empty() {
            result.add_error("Workflow defines no jobs");
        }

        if workflow.triggers.is_empty() {
            result.add_warning("Workflow defines no triggers");
        }

        let mut ids = HashSet::new();
        for job in &workflow.jobs {
            if job.id.trim().is_empty() {
                result.add_error("Job with empty id");
                continue;
            }
            if !ids.insert(job.id.as_str()) {
                result.add_error(format!("Duplicate job id '{}'", job.id));
            }
            if job.steps.is_empty() {
                result.add_error(format!("Job '{}' has no steps", job.id));
            }
            for step in &job.steps {
                self.validate_step(&format!("job '{}'", job.id), step, result);
            }
        }

        for job in &workflow.jobs {
            for need in &job.needs {
                if workflow.job(need).is_none() {
                    result.add_error(format!(
                        "Job '{}' needs unknown job '{}'",
                        job.id, need
                    ));
                }
            }
        }
    }

    fn validate_steps<'a>(
        &self,
        owner: &str,
        steps: impl Iterator<Item = &'a StepTemplate>,
        result: &mut ValidationResult,
    ) {
        let mut count = 0;
        for step in steps {
            count += 1;
            self.validate_step(owner, step, result);
        }
        if count == 0 {
            result.add_error(format!("The {} template defines no steps", owner));
        }
    }

    fn validate_step(&self, owner: &str, step: &StepTemplate, result: &mut ValidationResult) {
        match (&step.uses, &step.run) {
            (Some(_), Some(_)) => result.add_error(format!(
                "Step '{}' in {} sets both 'uses' and 'run'",
                step.label(),
                owner
            )),
            (None, None) => result.add_error(format!(
                "Step '{}' in {} sets neither 'uses' nor 'run'",
                step.label(),
                owner
            )),
            (Some(action), None) if !action.contains('@') && !action.starts_with("./") => {
                result.add_warning(format!("Action '{}' is not pinned to a version", action))
            }
            _ => {}
        }
    }

    fn validate_cache(&self, cache: &CacheStrategy, result: &mut ValidationResult) {
        if !cache.enabled {
            return;
        }
        if cache.paths.is_empty() {
            result.add_error("Cache strategy is enabled but lists no paths");
        }
        if cache.key.trim().is_empty() {
            result.add_warning("Cache strategy has no key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{FrameworkTemplate, JobTemplate, LanguageTemplate};

    fn framework(steps: Vec<StepTemplate>) -> Template {
        Template::Framework(FrameworkTemplate {
            name: "React".to_string(),
            framework: "react".to_string(),
            language: None,
            category: None,
            description: String::new(),
            setup_steps: Vec::new(),
            build_steps: steps,
            test_steps: Vec::new(),
            custom_steps: Vec::new(),
            cache: None,
        })
    }

    #[test]
    fn test_valid_framework() {
        let result = TemplateValidator::new()
            .validate(&framework(vec![StepTemplate::run("Build", "npm run build")]));
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_framework_without_steps() {
        let result = TemplateValidator::new().validate(&framework(Vec::new()));
        assert!(!result.valid);
        assert!(result.errors[0].contains("no steps"));
    }

    #[test]
    fn test_step_needs_exactly_one_action() {
        let mut step = StepTemplate::run("Both", "make");
        step.uses = Some("actions/setup-node@v4".to_string());
        let result = TemplateValidator::new()
            .validate(&framework(vec![step, StepTemplate::default()]));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_workflow_checks() {
        let mut workflow = WorkflowTemplate::new("CI");
        workflow.jobs.push(JobTemplate::new("build", "Build").needs("setup"));
        workflow.jobs.push(
            JobTemplate::new("build", "Again").step(StepTemplate::uses("Checkout", "actions/checkout")),
        );

        let result = TemplateValidator::new().validate(&Template::Workflow(workflow));
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("has no steps")));
        assert!(result.errors.iter().any(|e| e.contains("Duplicate job id")));
        assert!(result.errors.iter().any(|e| e.contains("unknown job 'setup'")));
        assert!(result.warnings.iter().any(|w| w.contains("no triggers")));
        assert!(result.warnings.iter().any(|w| w.contains("not pinned")));
    }

    #[test]
    fn test_cache_without_paths() {
        let template = Template::Language(LanguageTemplate {
            name: "Node".to_string(),
            language: "nodejs".to_string(),
            version: None,
            description: String::new(),
            setup_steps: vec![StepTemplate::uses("Setup", "actions/setup-node@v4")],
            build_steps: Vec::new(),
            test_steps: Vec::new(),
            cache: Some(CacheStrategy {
                enabled: true,
                paths: Vec::new(),
                key: String::new(),
                restore_keys: Vec::new(),
            }),
        });
        let result = TemplateValidator::new().validate(&template);
        assert!(!result.valid);
        assert_eq!(result.warnings, vec!["Cache strategy has no key".to_string()]);
    }
}
