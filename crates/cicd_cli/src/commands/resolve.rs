//! Resolve command - Resolve a template through the fallback hierarchy.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;
use tracing::info;

use cicd_core::{
    DetectionResult, FrameworkCategory, FrameworkInfo, GenerationResult, GenerationStage,
    LanguageInfo, Recovered,
};
use cicd_templates::{Template, TemplateKind};

use super::GlobalArgs;

#[derive(Args)]
pub struct ResolveArgs {
    #[command(subcommand)]
    pub target: ResolveTarget,
}

#[derive(Subcommand)]
pub enum ResolveTarget {
    /// Resolve the template for a framework built with a language
    Framework {
        /// Framework name (e.g., react, django)
        #[arg(short, long)]
        framework: String,

        /// Language name (e.g., nodejs, python)
        #[arg(short, long)]
        language: String,

        /// Framework category (frontend, backend, fullstack, ...)
        #[arg(long, default_value = "other")]
        category: String,
    },

    /// Resolve the template for a language toolchain
    Language {
        /// Language name (e.g., python)
        #[arg(short, long)]
        language: String,

        /// Language version (e.g., 3.12)
        #[arg(long)]
        lang_version: Option<String>,
    },

    /// Resolve a workflow template for a detection result
    Workflow {
        /// Primary workflow template name
        #[arg(short, long)]
        name: String,

        /// Detection result file (JSON or YAML)
        #[arg(short, long)]
        detection: Option<PathBuf>,
    },
}

pub async fn execute(args: ResolveArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.engine_config()?;
    let manager = config.build_manager();
    let recovery = config.recovery();
    let manager = &manager;

    let resolved: GenerationResult<Recovered<Recovered<Arc<Template>>>> = match args.target {
        ResolveTarget::Framework {
            framework,
            language,
            category,
        } => {
            info!("Resolving framework template for {} ({})", framework, language);
            let framework = &FrameworkInfo::new(framework, FrameworkCategory::from_str(&category));
            let language = &LanguageInfo::new(language).primary();
            recovery
                .with_retry(
                    move || async move {
                        manager
                            .get_framework_template(framework, language)
                            .await
                            .into_result()
                    },
                    GenerationStage::TemplateLoading,
                )
                .await
        }
        ResolveTarget::Language {
            language,
            lang_version,
        } => {
            info!("Resolving language template for {}", language);
            let mut info = LanguageInfo::new(language).primary();
            if let Some(version) = lang_version {
                info = info.with_version(version);
            }
            let language = &info;
            recovery
                .with_retry(
                    move || async move { manager.get_language_template(language).await.into_result() },
                    GenerationStage::TemplateLoading,
                )
                .await
        }
        ResolveTarget::Workflow { name, detection } => {
            info!("Resolving workflow template '{}'", name);
            let detection = match detection {
                Some(path) => DetectionResult::from_file(&path)
                    .await
                    .with_context(|| format!("Failed to read detection result {:?}", path))?,
                None => DetectionResult::new(),
            };
            let (detection, name) = (&detection, name.as_str());
            recovery
                .with_retry(
                    move || async move {
                        manager
                            .get_template_with_fallback(detection, TemplateKind::Workflow, name)
                            .await
                            .into_result()
                    },
                    GenerationStage::TemplateLoading,
                )
                .await
        }
    };

    let resolved = match resolved {
        Ok(outer) => {
            let mut warnings = outer.data.warnings;
            warnings.extend(outer.warnings);
            Recovered {
                data: outer.data.data,
                warnings,
            }
        }
        Err(err) => {
            if global.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "success": false,
                        "error": err.to_log_format(),
                        "recovery_actions": err.recovery_actions(),
                    }))?
                );
            } else {
                eprintln!("{}", err.user_message());
                for action in err.recovery_actions() {
                    eprintln!("   → {}", action);
                }
            }
            return Err(err.into());
        }
    };

    if global.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "success": true,
                "template": resolved.data.as_ref(),
                "warnings": resolved.warnings,
            }))?
        );
    } else {
        for warning in &resolved.warnings {
            eprintln!("⚠️  {}", warning);
        }
        print!(
            "{}",
            resolved
                .data
                .to_yaml()
                .context("Failed to serialize resolved template")?
        );
    }

    Ok(())
}
