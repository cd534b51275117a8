//! mangawatch CLI entry point.
//!
//! Binary name: `mwatch`
//!
//! Parses CLI arguments, initializes tracing, the database, and services,
//! then dispatches to the command handler.

mod cli;
mod state;

use std::time::Instant;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,mangawatch_core=debug,mangawatch_infra=debug",
        _ => "trace",
    };
    mangawatch_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "mwatch", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let recipient = cli.recipient();
    let json = cli.json;
    let command = cli.command.name();
    let started = Instant::now();

    let result = match cli.command {
        Commands::Subscribe { manga, lang } => {
            cli::subscription::subscribe(&state, &recipient, &manga, lang, json).await
        }
        Commands::Unsubscribe { manga, lang } => {
            cli::subscription::unsubscribe(&state, &recipient, &manga, &lang, json).await
        }
        Commands::UnsubscribeAll => {
            cli::subscription::unsubscribe_all(&state, &recipient, json).await
        }
        Commands::List => cli::subscription::list(&state, &recipient, json).await,
        Commands::Manga { manga } => cli::subscription::manga(&state, &manga, json).await,
        Commands::Updates => cli::subscription::updates(&state, json).await,
        Commands::Poll { log_only } => cli::dispatch::poll(&state, log_only, json).await,
        Commands::Serve { interval, log_only } => {
            cli::dispatch::serve(&state, interval, log_only).await
        }
        Commands::Context { action } => {
            cli::context::handle_context_command(action, &state, &recipient, json).await
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    };
    mangawatch_observe::metrics::record_command(command, started.elapsed());

    mangawatch_observe::tracing_setup::shutdown_tracing();
    result
}
