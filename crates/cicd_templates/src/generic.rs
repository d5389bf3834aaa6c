//! Built-in generic workflow templates.
//!
//! These are the last resort when no stored template could be used. They are
//! built in code, never touch storage and cannot fail. Each tier extends the
//! previous one.

use std::collections::BTreeMap;

use cicd_core::GenericTier;
use serde_json::json;

use crate::template::{
    BranchFilter, CronSchedule, JobTemplate, MatrixStrategy, StepTemplate, WorkflowTemplate,
    WorkflowTriggers,
};

/// Synthesizer for the generic template tiers.
pub struct GenericTemplates;

impl GenericTemplates {
    /// Candidate name used when reporting a synthesized fallback.
    pub fn candidate_name(tier: GenericTier) -> String {
        format!("generic-{}", tier)
    }

    pub fn synthesize(tier: GenericTier) -> WorkflowTemplate {
        match tier {
            GenericTier::Minimal => Self::minimal(),
            GenericTier::Basic => Self::basic(),
            GenericTier::Standard => Self::standard(),
            GenericTier::Comprehensive => Self::comprehensive(),
        }
    }

    fn checkout() -> StepTemplate {
        StepTemplate::uses("Checkout", "actions/checkout@v4")
    }

    fn build() -> StepTemplate {
        StepTemplate::run(
            "Build",
            "if [ -f Makefile ]; then make build; else echo \"No build step configured\"; fi",
        )
    }

    fn test() -> StepTemplate {
        StepTemplate::run(
            "Test",
            "if [ -f Makefile ]; then make test; else echo \"No test step configured\"; fi",
        )
    }

    fn install() -> StepTemplate {
        StepTemplate::run(
            "Install dependencies",
            "if [ -f Makefile ]; then make deps || true; fi",
        )
    }

    fn lint() -> StepTemplate {
        StepTemplate::run(
            "Lint",
            "if [ -f Makefile ]; then make lint || true; fi",
        )
    }

    fn triggers() -> WorkflowTriggers {
        WorkflowTriggers {
            push: Some(BranchFilter::branches(&["main"])),
            pull_request: Some(BranchFilter::branches(&["main"])),
            ..Default::default()
        }
    }

    fn workflow(tier: GenericTier, description: &str) -> WorkflowTemplate {
        let mut workflow = WorkflowTemplate::new(format!("Generic CI ({})", tier));
        workflow.description = description.to_string();
        workflow.triggers = Self::triggers();
        workflow
    }

    fn security_job() -> JobTemplate {
        JobTemplate::new("security", "Security scan")
            .needs("build")
            .step(Self::checkout())
            .step(StepTemplate::uses("Initialize CodeQL", "github/codeql-action/init@v3"))
            .step(StepTemplate::uses("Analyze", "github/codeql-action/analyze@v3"))
    }

    fn minimal() -> WorkflowTemplate {
        let mut workflow = Self::workflow(GenericTier::Minimal, "Checkout, build and test");
        workflow.jobs.push(
            JobTemplate::new("build", "Build")
                .step(Self::checkout())
                .step(Self::build())
                .step(Self::test()),
        );
        workflow
    }

    fn basic() -> WorkflowTemplate {
        let mut workflow = Self::workflow(
            GenericTier::Basic,
            "Checkout, install, build and test with read-only permissions",
        );
        workflow.permissions = permissions(&[("contents", "read")]);
        workflow.jobs.push(
            JobTemplate::new("build", "Build")
                .step(Self::checkout())
                .step(Self::install())
                .step(Self::build())
                .step(Self::test()),
        );
        workflow
    }

    fn standard() -> WorkflowTemplate {
        let mut workflow = Self::workflow(
            GenericTier::Standard,
            "Build and test plus a code scanning job",
        );
        workflow.permissions = permissions(&[
            ("actions", "read"),
            ("contents", "read"),
            ("security-events", "write"),
        ]);
        workflow.jobs.push(
            JobTemplate::new("build", "Build")
                .step(Self::checkout())
                .step(Self::install())
                .step(Self::lint())
                .step(Self::build())
                .step(Self::test()),
        );
        workflow.jobs.push(Self::security_job());
        workflow
    }

    fn comprehensive() -> WorkflowTemplate {
        let mut workflow = Self::workflow(
            GenericTier::Comprehensive,
            "Matrix build, code scanning, scheduled runs and deployment",
        );
        workflow.triggers.schedule.push(CronSchedule {
            cron: "0 0 * * 0".to_string(),
        });
        workflow.triggers.workflow_dispatch = true;
        workflow.permissions = permissions(&[
            ("actions", "read"),
            ("contents", "read"),
            ("security-events", "write"),
        ]);

        let mut matrix = BTreeMap::new();
        matrix.insert(
            "os".to_string(),
            vec![json!("ubuntu-latest"), json!("windows-latest"), json!("macos-latest")],
        );

        workflow.jobs.push(
            JobTemplate::new("build", "Build")
                .runs_on("${{ matrix.os }}")
                .strategy(MatrixStrategy {
                    matrix,
                    fail_fast: Some(false),
                    max_parallel: None,
                })
                .step(Self::checkout())
                .step(
                    StepTemplate::uses("Cache dependencies", "actions/cache@v4")
                        .with_input("path", "~/.cache")
                        .with_input("key", "${{ runner.os }}-deps-${{ github.sha }}"),
                )
                .step(Self::install())
                .step(Self::lint())
                .step(Self::build())
                .step(Self::test())
                .step(
                    StepTemplate::uses("Upload artifacts", "actions/upload-artifact@v4")
                        .with_input("name", "build-${{ matrix.os }}")
                        .with_input("path", "dist/")
                        .with_input("if-no-files-found", "ignore"),
                ),
        );
        workflow.jobs.push(Self::security_job());
        workflow.jobs.push(
            JobTemplate::new("deploy", "Deploy")
                .needs("build")
                .needs("security")
                .with_condition("github.ref == 'refs/heads/main' && github.event_name == 'push'")
                .permission("contents", "read")
                .permission("deployments", "write")
                .step(Self::checkout())
                .step(
                    StepTemplate::uses("Download artifacts", "actions/download-artifact@v4")
                        .with_input("path", "dist/"),
                )
                .step(StepTemplate::run(
                    "Deploy",
                    "if [ -f Makefile ]; then make deploy; else echo \"No deploy step configured\"; fi",
                )),
        );
        workflow
    }
}

fn permissions(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(scope, access)| (scope.to_string(), access.to_string()))
        .collect()
}
