//! Generic command - Print a built-in generic template.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use cicd_core::GenericTier;
use cicd_templates::{GenericTemplates, Template};

use super::GlobalArgs;

fn parse_tier(s: &str) -> Result<GenericTier, String> {
    GenericTier::from_str(s).ok_or_else(|| {
        let tiers: Vec<_> = GenericTier::all().iter().map(|t| t.as_str()).collect();
        format!("unknown tier '{}' (expected one of: {})", s, tiers.join(", "))
    })
}

#[derive(Args)]
pub struct GenericArgs {
    /// Complexity tier: minimal, basic, standard or comprehensive
    #[arg(value_parser = parse_tier, default_value = "basic")]
    pub tier: GenericTier,
}

pub async fn execute(args: GenericArgs, global: &GlobalArgs) -> Result<()> {
    info!("Synthesizing generic template ({})", args.tier);

    let template = Template::Workflow(GenericTemplates::synthesize(args.tier));
    if global.json {
        println!("{}", serde_json::to_string_pretty(&template)?);
    } else {
        print!(
            "{}",
            template
                .to_yaml()
                .context("Failed to serialize generic template")?
        );
    }
    Ok(())
}
