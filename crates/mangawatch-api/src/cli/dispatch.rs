//! Delivery commands: a single dispatch pass (`poll`) and the periodic loop
//! (`serve`).
//!
//! Notifications are written to stdout as JSON lines unless `--log-only` is
//! given, so human-facing output from these commands goes to stderr.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use mangawatch_core::dispatch::dispatcher::{DispatchReport, Dispatcher};
use mangawatch_core::dispatch::notifier::{LogNotifier, Notifier};
use mangawatch_infra::catalog::mangadex::MangaDexClient;
use mangawatch_infra::config::resolve_poll_interval;
use mangawatch_infra::notifier::JsonLinesNotifier;
use mangawatch_infra::sqlite::conversation::SqliteConversationRepository;
use mangawatch_infra::sqlite::subscription::SqliteSubscriptionRepository;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Dispatcher pinned to the concrete infra implementations.
pub type ConcreteDispatcher<N> =
    Dispatcher<SqliteSubscriptionRepository, MangaDexClient, SqliteConversationRepository, N>;

fn dispatcher<N: Notifier>(state: &AppState, notifier: N) -> ConcreteDispatcher<N> {
    Dispatcher::new(
        Arc::clone(&state.subscription_service),
        Arc::clone(&state.conversation_service),
        Arc::new(notifier),
    )
}

pub async fn poll(state: &AppState, log_only: bool, json: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let report = if log_only {
        dispatcher(state, LogNotifier).run_once(&cancel).await?
    } else {
        let notifier = JsonLinesNotifier::stdout(state.config.reader_base_url.clone());
        dispatcher(state, notifier).run_once(&cancel).await?
    };

    print_report(&report, json, log_only)
}

fn print_report(report: &DispatchReport, json: bool, to_stdout: bool) -> Result<()> {
    let text = if json {
        serde_json::to_string(report)?
    } else {
        format!(
            "  {} {} updates, {} delivered, {} failed, {} recipients removed",
            style("ok").green(),
            report.updates,
            report.delivered,
            report.transient,
            report.permanent,
        )
    };

    if to_stdout {
        println!("{text}");
    } else {
        eprintln!("{text}");
    }
    Ok(())
}

pub async fn serve(state: &AppState, interval: Option<u64>, log_only: bool) -> Result<()> {
    let mut config = state.config.clone();
    if let Some(secs) = interval {
        config.poll_interval_secs = secs;
    }
    let period = resolve_poll_interval(&config);

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        stopper.cancel();
    });

    eprintln!(
        "  {} Polling {} every {}s (data in {})",
        style("⚡").bold(),
        style(&state.config.catalog_base_url).cyan(),
        period.as_secs(),
        state.data_dir.display(),
    );
    eprintln!("  {}", style("Press Ctrl+C to stop").dim());

    if log_only {
        dispatcher(state, LogNotifier).run(period, cancel).await;
    } else {
        let notifier = JsonLinesNotifier::stdout(state.config.reader_base_url.clone());
        dispatcher(state, notifier).run(period, cancel).await;
    }

    eprintln!("\n  Stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
