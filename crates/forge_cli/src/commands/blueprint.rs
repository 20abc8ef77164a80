//! Blueprint command - Instantiate a blueprint.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use forge_blueprint::{instantiate_blueprint, parse_answers, InstantiateOptions, PrepareOptions};
use forge_functions::FunctionRegistry;

use crate::config::ForgeConfig;
use crate::prompt::TerminalPrompter;

#[derive(Args)]
pub struct BlueprintArgs {
    /// Blueprint path in the repository, e.g. aws/monolith
    #[arg(short, long)]
    blueprint: String,

    /// YAML file with answers keyed by variable name
    #[arg(short, long)]
    answers: Option<PathBuf>,

    /// Fail on variables missing from the answers file and on unknown answers
    #[arg(short, long, requires = "answers")]
    strict_answers: bool,

    /// Use default values instead of asking
    #[arg(short = 'd', long)]
    use_defaults: bool,

    /// Blueprint repository directory
    #[arg(short, long, env = "FORGE_REPOSITORY")]
    repository: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, env = "FORGE_OUTPUT")]
    output: Option<PathBuf>,
}

pub fn execute(args: BlueprintArgs, config: &ForgeConfig, quiet: bool) -> Result<()> {
    info!("Instantiating blueprint: {}", args.blueprint);

    let repository = super::open_repository(args.repository, config)?;
    let output_dir = args.output.unwrap_or_else(|| config.output.dir.clone());

    let answers = match &args.answers {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read answers file {:?}", path))?;
            Some(parse_answers(&content).context("Invalid answers file")?)
        }
        None => None,
    };

    let options = InstantiateOptions::new(args.blueprint.clone(), &output_dir).with_prepare(
        PrepareOptions {
            answers,
            strict_answers: args.strict_answers,
            use_defaults: args.use_defaults,
        },
    );

    if !quiet {
        println!("📐 Instantiating blueprint {}...\n", args.blueprint);
    }

    let functions = FunctionRegistry::with_defaults();
    let mut prompter = TerminalPrompter::stdio();
    let report = instantiate_blueprint(&options, &repository, &functions, &mut prompter)
        .with_context(|| format!("Failed to instantiate blueprint {}", args.blueprint))?;

    if !quiet {
        println!();
        println!("✅ Blueprint {} generated in {:?}", args.blueprint, output_dir);
        if report.blueprints.len() > 1 {
            println!("   Composed from: {}", report.blueprints.join(", "));
        }
        println!("   Files:");
        for file in &report.created_files {
            let shown = file.strip_prefix(&output_dir).unwrap_or(file);
            println!("   - {}", shown.display());
        }
    }

    let instructions = report.instructions.trim();
    if !instructions.is_empty() {
        println!();
        println!("📝 Next steps:");
        for line in instructions.lines() {
            println!("   {}", line);
        }
    }

    Ok(())
}
