//! CLI command definitions for the `mwatch` binary.
//!
//! Uses clap derive macros for argument parsing. Every command acts on behalf
//! of one recipient, chosen with `--recipient` (or `MANGAWATCH_RECIPIENT`).

pub mod context;
pub mod dispatch;
pub mod subscription;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use mangawatch_types::subscription::{Language, Recipient};

/// Follow manga and get notified about new chapters.
#[derive(Parser)]
#[command(name = "mwatch", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Recipient the command acts for.
    #[arg(long, global = true, env = "MANGAWATCH_RECIPIENT", default_value = "local")]
    pub recipient: String,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn recipient(&self) -> Recipient {
        Recipient::new(self.recipient.clone())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to a manga (id or mangadex.org title link).
    #[command(alias = "sub")]
    Subscribe {
        /// Manga id or link.
        manga: String,

        /// Language code, or `any` for every language.
        #[arg(short, long, default_value = "any")]
        lang: Language,
    },

    /// Remove one subscription.
    #[command(alias = "unsub")]
    Unsubscribe {
        /// Manga id or link.
        manga: String,

        /// Language of the subscription to remove.
        #[arg(short, long, default_value = "any")]
        lang: Language,
    },

    /// Remove every subscription of the recipient.
    #[command(name = "unsubscribe-all")]
    UnsubscribeAll,

    /// List the recipient's subscriptions.
    #[command(alias = "ls")]
    List,

    /// Show catalog metadata for a manga.
    Manga {
        /// Manga id or link.
        manga: String,
    },

    /// Run one detection pass and print the updates found.
    ///
    /// Found chapters are recorded as notified, exactly as a poll would.
    Updates,

    /// Run one detection pass and deliver the updates.
    Poll {
        /// Log deliveries instead of writing JSON lines to stdout.
        #[arg(long)]
        log_only: bool,
    },

    /// Poll periodically and deliver updates until interrupted.
    Serve {
        /// Seconds between passes (defaults to `poll_interval_secs`).
        #[arg(long)]
        interval: Option<u64>,

        /// Log deliveries instead of writing JSON lines to stdout.
        #[arg(long)]
        log_only: bool,
    },

    /// Inspect or change the recipient's pending command.
    Context {
        #[command(subcommand)]
        action: context::ContextCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Commands {
    /// Command name used as the `command` metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Subscribe { .. } => "subscribe",
            Commands::Unsubscribe { .. } => "unsubscribe",
            Commands::UnsubscribeAll => "unsubscribe-all",
            Commands::List => "list",
            Commands::Manga { .. } => "manga",
            Commands::Updates => "updates",
            Commands::Poll { .. } => "poll",
            Commands::Serve { .. } => "serve",
            Commands::Context { .. } => "context",
            Commands::Completions { .. } => "completions",
        }
    }
}
