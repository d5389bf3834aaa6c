//! CLI command definitions.
//!
//! This module defines the command structure for the cicdgen CLI.
//! Each subcommand maps to one entry point of the resolution engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use cicd_templates::EngineConfig;

pub mod check_templates;
pub mod generic;
pub mod resolve;

/// cicdgen - resilient CI/CD template resolution
#[derive(Parser)]
#[command(name = "cicdgen")]
#[command(version, about = "cicdgen - resilient CI/CD template resolution")]
#[command(long_about = r#"
cicdgen resolves CI/CD workflow templates for detected frameworks and
languages, falling back through a template hierarchy and built-in generic
templates when the ideal template is missing or broken.

COMMANDS:
  resolve          → Resolve a framework, language or workflow template
  generic          → Print a built-in generic template
  check-templates  → Decode and validate every stored template

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON instead of YAML/text
    #[arg(long, global = true)]
    pub json: bool,

    /// Templates directory (overrides the config file)
    #[arg(long, global = true, env = "CICDGEN_TEMPLATES_DIR")]
    pub templates_dir: Option<PathBuf>,

    /// Engine configuration file (YAML)
    #[arg(short, long, global = true, env = "CICDGEN_CONFIG")]
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    /// Engine configuration from `--config`, with `--templates-dir` applied.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => EngineConfig::default(),
        };
        if let Some(dir) = &self.templates_dir {
            config = config.with_templates_dir(dir);
        }
        debug!("Using templates directory {:?}", config.templates_dir);
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a template through the fallback hierarchy
    Resolve(resolve::ResolveArgs),

    /// Print a built-in generic template
    Generic(generic::GenericArgs),

    /// Decode and validate every stored template
    #[command(name = "check-templates")]
    CheckTemplates(check_templates::CheckTemplatesArgs),
}
