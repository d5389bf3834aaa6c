//! Check-templates command - Decode and validate every stored template.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use cicd_templates::{
    FsTemplateStore, TemplateKey, TemplateKind, TemplateStore, TemplateValidator,
};

use super::GlobalArgs;

#[derive(Args)]
pub struct CheckTemplatesArgs {
    /// Only check templates of this kind (workflow, framework, language)
    #[arg(short, long)]
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
struct TemplateReport {
    key: String,
    source: Option<String>,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

async fn check(
    store: &FsTemplateStore,
    validator: &TemplateValidator,
    key: TemplateKey,
) -> TemplateReport {
    let mut report = TemplateReport {
        key: key.to_string(),
        source: None,
        valid: false,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let raw = match store.read(&key).await {
        Ok(raw) => raw,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };
    report.source = Some(raw.source.clone());

    match raw.decode() {
        Ok(template) => {
            let result = validator.validate(&template);
            report.valid = result.valid;
            report.errors = result.errors;
            report.warnings = result.warnings;
        }
        Err(e) => report.errors.push(e.to_string()),
    }
    report
}

pub async fn execute(args: CheckTemplatesArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.engine_config()?;
    let templates_path = config.templates_dir;

    if !templates_path.exists() {
        anyhow::bail!("Templates directory not found: {:?}", templates_path);
    }

    let kinds = match &args.kind {
        Some(kind) => vec![TemplateKind::from_str(kind)
            .with_context(|| format!("Invalid argument: unknown template kind '{}'", kind))?],
        None => TemplateKind::all(),
    };

    info!("Checking templates in {:?}", templates_path);
    let store = FsTemplateStore::new(&templates_path);
    let validator = TemplateValidator::new();

    let mut reports = Vec::new();
    for kind in kinds {
        let names = store
            .list(kind)
            .await
            .with_context(|| format!("Failed to list {} templates", kind))?;
        for name in names {
            reports.push(check(&store, &validator, TemplateKey::new(kind, name)).await);
        }
    }

    let failed = reports.iter().filter(|r| !r.valid).count();

    if global.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else if reports.is_empty() {
        println!("⚠️  No templates found in {:?}", templates_path);
    } else {
        println!("🧪 Checking {} template(s)...\n", reports.len());
        for report in &reports {
            if report.valid {
                println!("{} ✅", report.key);
            } else {
                println!("{} ❌", report.key);
            }
            for error in &report.errors {
                println!("   - {}", error);
            }
            for warning in &report.warnings {
                println!("   ⚠️  {}", warning);
            }
        }
        println!();
        println!("Results: {} passed, {} failed", reports.len() - failed, failed);
    }

    if failed > 0 {
        anyhow::bail!("Template validation failed for {} template(s)", failed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_check_reports_invalid_templates() {
        let temp = tempdir().unwrap();
        let frameworks = temp.path().join("frameworks");
        fs::create_dir_all(&frameworks).unwrap();
        fs::write(
            frameworks.join("react-generic.yaml"),
            "name: React\nframework: react\nbuild_steps:\n  - run: npm run build\n",
        )
        .unwrap();
        fs::write(frameworks.join("vue-generic.yaml"), "name: Vue\nframework: vue\n").unwrap();
        fs::write(frameworks.join("svelte-generic.yaml"), "name: [broken").unwrap();

        let store = FsTemplateStore::new(temp.path());
        let validator = TemplateValidator::new();

        let ok = check(&store, &validator, TemplateKey::new(TemplateKind::Framework, "react-generic")).await;
        assert!(ok.valid);
        assert!(ok.source.unwrap().ends_with("react-generic.yaml"));

        let no_steps = check(&store, &validator, TemplateKey::new(TemplateKind::Framework, "vue-generic")).await;
        assert!(!no_steps.valid);

        let broken = check(&store, &validator, TemplateKey::new(TemplateKind::Framework, "svelte-generic")).await;
        assert!(!broken.valid);
        assert_eq!(broken.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_fails_on_invalid_template() {
        let temp = tempdir().unwrap();
        let languages = temp.path().join("languages");
        fs::create_dir_all(&languages).unwrap();
        fs::write(languages.join("go-latest.yaml"), "name: Go\nlanguage: go\n").unwrap();

        let global = GlobalArgs {
            verbose: false,
            json: true,
            templates_dir: Some(temp.path().to_path_buf()),
            config: None,
        };
        let err = execute(CheckTemplatesArgs { kind: None }, &global)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }
}
