//! Conversation context subcommands.

use anyhow::Result;
use clap::Subcommand;
use console::style;
use mangawatch_types::subscription::Recipient;

use crate::state::AppState;

/// Conversation context subcommands.
#[derive(Subcommand)]
pub enum ContextCommand {
    /// Show the pending command, if any.
    Show,

    /// Set the pending command, replacing any previous one.
    Set {
        /// Command name (e.g. `subscribe`).
        command: String,
    },

    /// Clear the pending command.
    Clear,
}

/// Handle a context subcommand.
pub async fn handle_context_command(
    cmd: ContextCommand,
    state: &AppState,
    recipient: &Recipient,
    json: bool,
) -> Result<()> {
    match cmd {
        ContextCommand::Show => show(state, recipient, json).await,
        ContextCommand::Set { command } => set(state, recipient, &command, json).await,
        ContextCommand::Clear => clear(state, recipient, json).await,
    }
}

async fn show(state: &AppState, recipient: &Recipient, json: bool) -> Result<()> {
    let pending = state.conversation_service.context(recipient).await?;

    if json {
        let result = serde_json::json!({ "recipient": recipient, "command": pending });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    match pending {
        Some(command) => println!(
            "  Command {} is in progress for '{}'.",
            style(&command).cyan().bold(),
            style(recipient).cyan(),
        ),
        None => println!(
            "  {} No command in progress for '{}'.",
            style("i").blue().bold(),
            style(recipient).cyan(),
        ),
    }
    println!();

    Ok(())
}

async fn set(state: &AppState, recipient: &Recipient, command: &str, json: bool) -> Result<()> {
    state.conversation_service.set_context(recipient, command).await?;

    if json {
        let result = serde_json::json!({ "recipient": recipient, "command": command });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Command {} is now in progress.",
            style("ok").green(),
            style(command).cyan().bold(),
        );
        println!();
    }

    Ok(())
}

async fn clear(state: &AppState, recipient: &Recipient, json: bool) -> Result<()> {
    let pending = state.conversation_service.context(recipient).await?;
    state.conversation_service.clear_context(recipient).await?;

    if json {
        let result = serde_json::json!({ "recipient": recipient, "cancelled": pending });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    match pending {
        Some(command) => println!(
            "  {} The command {} has been cancelled.",
            style("ok").green(),
            style(&command).cyan().bold(),
        ),
        None => println!("  {} There is no command to cancel.", style("i").blue().bold()),
    }
    println!();

    Ok(())
}
