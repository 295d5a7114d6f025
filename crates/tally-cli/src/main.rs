#![forbid(unsafe_code)]

mod cmd;
mod notify;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tally_core::config::resolve_config;
use tally_core::{ErrorCode, TallyError};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tally: daily reports and task stages from the terminal",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (overrides TALLY_USER and config).
    #[arg(long, global = true, value_name = "ID")]
    user: Option<String>,

    /// Store file (overrides store.path in .tally/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Reports",
        about = "Submit, edit and review daily reports",
        long_about = "Submit, edit and review daily reports. Every change is shown at once and rolled back if the store refuses it.",
        after_help = "EXAMPLES:\n    # Submit today's report\n    tally report submit \"Paired on the billing fix\"\n\n    # Machine-readable listing\n    tally report list --json"
    )]
    Report {
        #[command(subcommand)]
        command: cmd::reports::ReportCommand,
    },

    #[command(
        next_help_heading = "Tasks",
        about = "Browse team tasks, move stages, trash",
        after_help = "EXAMPLES:\n    # Tasks still to do\n    tally task list --stage todo\n\n    # Finish a task\n    tally task stage 66a1 completed"
    )]
    Task {
        #[command(subcommand)]
        command: cmd::tasks::TaskCommand,
    },

    #[command(
        next_help_heading = "Shell",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    tally completions bash > ~/.local/share/bash-completion/completions/tally"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "tally=debug,info"
        } else {
            "tally=info,warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs go to stderr
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn dispatch(command: &Commands, ctx: &cmd::Context) -> anyhow::Result<()> {
    match command {
        Commands::Report { command } => cmd::reports::run_report(command, ctx).await,
        Commands::Task { command } => cmd::tasks::run_task(command, ctx).await,
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}

/// Map any command failure onto a coded error.
fn to_cli_error(err: &anyhow::Error) -> CliError {
    if let Some(e) = err.downcast_ref::<TallyError>() {
        return CliError::from(e);
    }
    if let Some(e) = err.downcast_ref::<CliError>() {
        return e.clone();
    }
    CliError::coded(format!("{err:#}"), ErrorCode::InternalUnexpected)
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let config = match resolve_config(&project_root, cli.json) {
        Ok(config) => config,
        Err(e) => {
            let mode = if cli.json {
                OutputMode::Json
            } else {
                OutputMode::Text
            };
            render_error(
                mode,
                &CliError::coded(format!("{e:#}"), ErrorCode::ConfigParseError),
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };
    debug!(store = %config.store_path.display(), output = %config.resolved_output, "config resolved");

    let ctx = cmd::Context::new(config, cli.user.clone(), cli.store.clone());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(dispatch(&cli.command, &ctx)) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            render_error(ctx.output, &to_cli_error(&e))?;
            Ok(ExitCode::FAILURE)
        }
    }
}
