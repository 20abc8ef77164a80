//! forge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error

use std::process::ExitCode;

use clap::Parser;
use forge_blueprint::BlueprintError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod prompt;

use commands::{Cli, Commands};
use config::ForgeConfig;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("forge={},warn", level)));

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = ForgeConfig::load(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Blueprint(args) => commands::blueprint::execute(args, &config, cli.quiet),
        Commands::List(args) => commands::list::execute(args, &config),
    });

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let Some(error) = e.chain().find_map(|c| c.downcast_ref::<BlueprintError>()) else {
        let msg = e.to_string().to_lowercase();
        return if msg.contains("not found") || msg.contains("configuration") {
            ExitCodes::INVALID_ARGS
        } else {
            ExitCodes::GENERAL_ERROR
        };
    };

    match error {
        BlueprintError::NotFound { .. } => ExitCodes::INVALID_ARGS,
        BlueprintError::Schema(_)
        | BlueprintError::IncludeNotFound { .. }
        | BlueprintError::CyclicInclude(_)
        | BlueprintError::InvalidAnswer { .. }
        | BlueprintError::MissingAnswer(_)
        | BlueprintError::UnknownAnswers(_)
        | BlueprintError::Yaml(_) => ExitCodes::VALIDATION_FAILURE,
        BlueprintError::Render { .. } | BlueprintError::InvalidOutputPath(_) => {
            ExitCodes::TEMPLATE_ERROR
        }
        _ => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_categorize_blueprint_errors() {
        let not_found: anyhow::Error = BlueprintError::NotFound {
            name: "x".into(),
            repository: "local".into(),
        }
        .into();
        assert_eq!(categorize_error(&not_found), ExitCodes::INVALID_ARGS);

        let schema = Err::<(), _>(BlueprintError::Schema("bad".into()))
            .context("Failed to instantiate blueprint x")
            .unwrap_err();
        assert_eq!(categorize_error(&schema), ExitCodes::VALIDATION_FAILURE);

        let render: anyhow::Error = BlueprintError::Render {
            path: "a.tmpl".into(),
            message: "oops".into(),
        }
        .into();
        assert_eq!(categorize_error(&render), ExitCodes::TEMPLATE_ERROR);
    }

    #[test]
    fn test_categorize_other_errors() {
        let missing = anyhow::anyhow!("Repository directory not found: \"x\"");
        assert_eq!(categorize_error(&missing), ExitCodes::INVALID_ARGS);
        assert_eq!(categorize_error(&anyhow::anyhow!("boom")), ExitCodes::GENERAL_ERROR);
    }

    #[test]
    fn test_cli_parses_blueprint_flags() {
        let cli = Cli::try_parse_from([
            "forge", "-v", "blueprint", "-b", "aws/monolith", "-a", "answers.yaml", "-s", "-d",
            "-o", "out",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Blueprint(_)));
    }

    #[test]
    fn test_cli_strict_requires_answers() {
        assert!(Cli::try_parse_from(["forge", "blueprint", "-b", "x", "-s"]).is_err());
    }
}
