//! `flowcanvas` command-line tool.
//!
//! Graph output is written to stdout (or `--output`); logs go to stderr and
//! are filtered with `RUST_LOG`.

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use config::CliConfig;
use error::CliError;
use flowcanvas_core::{ExecutionId, WorkflowId};
use rootcause::prelude::Report;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "flowcanvas", version, about = "Work with flowcanvas workflow graphs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Auto-arrange a graph file.
    Layout {
        file: PathBuf,
        /// Reposition pinned nodes too.
        #[arg(long)]
        ignore_pinned: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rewrite a graph file in canonical form, dropping unusable parts.
    Sanitize {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert between graph files and templates.
    #[command(subcommand)]
    Template(TemplateCommand),
    /// Manage node shortcut keys.
    #[command(subcommand)]
    Shortcut(ShortcutCommand),
    /// Start a workflow run.
    Run {
        workflow_id: WorkflowId,
        /// Print the execution ID and exit instead of following the run.
        #[arg(long)]
        no_watch: bool,
    },
    /// Follow a running execution.
    Watch {
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
    },
}

#[derive(Debug, Subcommand)]
enum TemplateCommand {
    /// Wrap a graph file in a template.
    Export {
        file: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "General")]
        category: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        public: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract the graph from a template file.
    Import {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum ShortcutCommand {
    /// Map a single key to a node kind.
    Set { key: String, kind: String },
    /// List mapped keys.
    List,
}

async fn execute(command: Command) -> Result<(), Report<CliError>> {
    let config = CliConfig::from_env().map_err(|e| CliError::Config { details: e.to_string() })?;

    match command {
        Command::Layout {
            file,
            ignore_pinned,
            output,
        } => commands::write_output(&commands::layout(&file, !ignore_pinned)?, output.as_deref()),
        Command::Sanitize { file, output } => commands::write_output(&commands::sanitize(&file)?, output.as_deref()),
        Command::Template(TemplateCommand::Export {
            file,
            name,
            category,
            description,
            public,
            output,
        }) => {
            let text = commands::template_export(&file, &name, &category, description.as_deref(), public)?;
            commands::write_output(&text, output.as_deref())
        }
        Command::Template(TemplateCommand::Import { file, output }) => {
            commands::write_output(&commands::template_import(&file)?, output.as_deref())
        }
        Command::Shortcut(ShortcutCommand::Set { key, kind }) => {
            commands::set_shortcut(&config, &key, &kind)?;
            Ok(())
        }
        Command::Shortcut(ShortcutCommand::List) => {
            let preferences = commands::load_preferences(&config)?;
            commands::write_output(&commands::format_shortcuts(&preferences), None)
        }
        Command::Run { workflow_id, no_watch } => commands::run(&config, workflow_id, !no_watch).await,
        Command::Watch {
            workflow_id,
            execution_id,
        } => commands::watch(&config, workflow_id, execution_id).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
