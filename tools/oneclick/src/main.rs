//! OneClick - rule tooling from the command line
//!
//! Resolves macro tokens, validates rule configuration against a field
//! catalog, and evaluates rules for a recorded change event, all offline.

mod context;
mod macros;
mod rules;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use common::{init_logging, OneClickConfig};

use crate::context::Session;

#[derive(Parser)]
#[command(name = "oneclick")]
#[command(about = "OneClick - resolve macros, validate and evaluate work item rules")]
#[command(long_about = "OneClick - resolve macros, validate and evaluate work item rules

Commands:
  macros      List supported macro tokens
  resolve     Resolve a macro token against today, the current user and iterations
  validate    Check rule triggers against a field catalog
  evaluate    Decide which rules fire for a change event

Examples:
  oneclick macros
  oneclick resolve @Today-7 --today 2024-03-15
  oneclick resolve @FieldValue=System.State --field System.State=Active
  oneclick validate --rules rules.yaml --catalog bug-fields.json
  oneclick evaluate --rules rules.yaml --catalog bug-fields.json --event change.json

Settings are read from oneclick.yaml / oneclick.toml (or --config) and
ONECLICK_* environment variables, e.g. ONECLICK_LOGGING__LEVEL=debug.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short = 'c', long = "config", global = true, env = "ONECLICK_CONFIG")]
    config: Option<PathBuf>,

    /// Date used as "today" (yyyy-MM-dd)
    #[arg(long, global = true)]
    today: Option<String>,

    /// Current user, as "Display Name <unique name>"
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported macro tokens
    Macros,

    /// Resolve a macro token
    Resolve {
        /// Macro token, e.g. @Today+1 or @FieldValue=System.Title
        token: String,

        /// Field value served to @FieldValue (Name=Value, repeatable)
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// Validate rule triggers against a field catalog
    Validate {
        /// Rules document (JSON or YAML)
        #[arg(short, long)]
        rules: PathBuf,

        /// Field catalog of the targeted work item type
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Evaluate rules for a change event
    Evaluate {
        /// Rules document (JSON or YAML)
        #[arg(short, long)]
        rules: PathBuf,

        /// Field catalog of the changed work item's type
        #[arg(long)]
        catalog: PathBuf,

        /// Change event document
        #[arg(short, long)]
        event: PathBuf,

        /// Write per-rule decision logs under this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "ERROR".red(), e);
            ExitCode::FAILURE
        },
    }
}

/// Run a command; `Ok(false)` means it completed but found invalid rules
async fn run(cli: Cli) -> Result<bool> {
    let mut config = OneClickConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.no_color {
        config.logging.ansi = false;
    }
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    let command = cli.command;
    if let Commands::Evaluate {
        log_dir: Some(log_dir),
        ..
    } = &command
    {
        config.log_dir = Some(log_dir.clone());
    }

    let session = Session::new(config, cli.today.as_deref(), cli.user.as_deref())?;
    tracing::debug!("Today is {}", session.today);

    match command {
        Commands::Macros => macros::list_macros(cli.json).map(|_| true),
        Commands::Resolve { token, fields } => {
            macros::resolve_token(&session, &token, &fields, cli.json).map(|_| true)
        },
        Commands::Validate { rules, catalog } => {
            rules::validate(&session, &rules, &catalog, cli.json)
        },
        Commands::Evaluate {
            rules,
            catalog,
            event,
            ..
        } => rules::evaluate(&session, &rules, &catalog, &event, cli.json)
            .await
            .map(|_| true),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "oneclick",
            "evaluate",
            "--rules",
            "rules.yaml",
            "--catalog",
            "catalog.json",
            "--event",
            "event.json",
            "--today",
            "2024-03-15",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.today.as_deref(), Some("2024-03-15"));
        assert!(matches!(cli.command, Commands::Evaluate { log_dir: None, .. }));
    }

    #[test]
    fn test_parse_resolve_fields() {
        let cli = Cli::try_parse_from([
            "oneclick",
            "resolve",
            "@FieldValue=System.Title",
            "-f",
            "System.Title=Crash",
            "--field",
            "System.State=Active",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve { token, fields } => {
                assert_eq!(token, "@FieldValue=System.Title");
                assert_eq!(fields.len(), 2);
            },
            _ => panic!("expected resolve"),
        }
    }
}
