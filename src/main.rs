#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use teleshell::{Config, DispatchOutcome, channels};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// `teleshell` - run whitelisted shell commands from a Telegram chat.
#[derive(Parser, Debug)]
#[command(name = "teleshell")]
#[command(version)]
#[command(about = "Relay allow-listed admin commands from Telegram to the local shell.", long_about = None)]
struct Cli {
    /// Config file (default: ~/.teleshell/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay
    Start {
        /// Read commands from stdin instead of Telegram (no allow-list)
        #[arg(long)]
        cli: bool,
    },

    /// Run one command through the handlers and print the replies
    Exec {
        /// Command text, e.g. `teleshell exec restart router`
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// List handlers in dispatch order
    Handlers,

    /// Check Telegram connectivity and handler loading
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_init()?,
    };

    // Initialize logging - respects RUST_LOG env var, defaults to config log_level
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    match cli.command {
        Commands::Start { cli: true } => {
            info!("Starting relay on stdin/stdout");
            channels::start_cli(config).await
        }
        Commands::Start { cli: false } => {
            info!("Starting relay on Telegram");
            channels::start_channels(config).await
        }
        Commands::Exec { command } => {
            let command = command.join(" ");
            match channels::run_once(&config, &command).await {
                DispatchOutcome::Failed { handler, .. } => bail!("handler '{handler}' failed"),
                _ => Ok(()),
            }
        }
        Commands::Handlers => {
            let observer = teleshell::observability::NoopObserver;
            let registry = channels::build_registry(&config, &observer);
            println!("Handlers (dispatch order):");
            for (key, handler) in registry.iter() {
                println!("\n  {key}");
                for line in handler.help().lines() {
                    println!("    {line}");
                }
            }
            Ok(())
        }
        Commands::Doctor => channels::doctor_channels(&config).await,
    }
}
