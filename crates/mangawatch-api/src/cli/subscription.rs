//! Subscription commands: subscribe, unsubscribe, list, manga lookup, and a
//! one-off detection pass.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use mangawatch_core::repository::conversation::ConversationRepository;
use mangawatch_core::service::conversation::ConversationService;
use mangawatch_infra::catalog::mangadex::parse_manga_ref;
use mangawatch_infra::notifier::chapter_label;
use mangawatch_types::error::{ConversationError, SubscriptionError};
use mangawatch_types::manga::Manga;
use mangawatch_types::subscription::{Language, Recipient};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::state::AppState;

/// Resolve a manga id or title link into a bare id.
pub fn resolve_manga_id(input: &str) -> Result<String> {
    parse_manga_ref(input).with_context(|| {
        format!("'{input}' is not a manga id or a mangadex.org title link")
    })
}

/// Print an expected business outcome (not a failure).
fn print_user_error(err: &dyn std::fmt::Display, json: bool) -> Result<()> {
    if json {
        let result = serde_json::json!({ "error": err.to_string() });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!("  {} {}", style("!").yellow().bold(), err);
        println!();
    }
    Ok(())
}

/// Mark `command` as the recipient's pending command.
///
/// Returns `Ok(false)` after telling the user when a different command is
/// already pending.
async fn begin_command(
    state: &AppState,
    recipient: &Recipient,
    command: &str,
    json: bool,
) -> Result<bool> {
    match state.conversation_service.begin(recipient, command).await {
        Ok(()) => Ok(true),
        Err(e @ ConversationError::CommandInProgress(_)) => {
            print_user_error(&e, json)?;
            if !json {
                println!("     Clear it with: mwatch context clear");
                println!();
            }
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Clear the pending command and hand back the outcome it guarded.
///
/// The guarded change has already happened, so a failed clear is only
/// logged.
async fn finish_command<V: ConversationRepository, T>(
    conversations: &ConversationService<V>,
    recipient: &Recipient,
    outcome: T,
) -> T {
    if let Err(e) = conversations.clear_context(recipient).await {
        warn!(recipient = %recipient, error = %e, "failed to clear conversation context");
    }
    outcome
}

/// Refusal shown when `manga` has no translation in `language`.
fn language_refusal(manga: &Manga, language: &Language) -> Option<String> {
    if manga.offers(language) {
        return None;
    }
    let offered = if manga.available_languages.is_empty() {
        "none".to_string()
    } else {
        manga.available_languages.join(", ")
    };
    Some(format!(
        "{} has no '{language}' translation (available: {offered}; or use 'any')",
        manga.display_title()
    ))
}

pub async fn subscribe(
    state: &AppState,
    recipient: &Recipient,
    manga: &str,
    language: Language,
    json: bool,
) -> Result<()> {
    let manga_id = resolve_manga_id(manga)?;
    let found = match state.subscription_service.manga(&manga_id).await {
        Ok(found) => found,
        Err(e) if e.is_user_facing() => return print_user_error(&e, json),
        Err(e) => return Err(e.into()),
    };
    if let Some(refusal) = language_refusal(&found, &language) {
        return print_user_error(&refusal, json);
    }

    if !begin_command(state, recipient, "subscribe", json).await? {
        return Ok(());
    }

    let result = state
        .subscription_service
        .subscribe(recipient, &manga_id, language)
        .await;
    let result = finish_command(&state.conversation_service, recipient, result).await;

    let subscription = match result {
        Ok(subscription) => subscription,
        Err(e) if e.is_user_facing() => return print_user_error(&e, json),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&subscription)?);
    } else {
        println!();
        println!(
            "  {} You will be notified when a new chapter of [{}] {} is published.",
            style("ok").green(),
            style(&subscription.language).yellow(),
            style(&subscription.manga_title).cyan().bold(),
        );
        println!();
    }

    Ok(())
}

pub async fn unsubscribe(
    state: &AppState,
    recipient: &Recipient,
    manga: &str,
    language: &Language,
    json: bool,
) -> Result<()> {
    let manga_id = resolve_manga_id(manga)?;
    if !begin_command(state, recipient, "unsubscribe", json).await? {
        return Ok(());
    }

    let result = state
        .subscription_service
        .unsubscribe(recipient, &manga_id, language)
        .await;
    let result = finish_command(&state.conversation_service, recipient, result).await;

    let removed = match result {
        Ok(removed) => removed,
        Err(SubscriptionError::NoSuchSubscription) => {
            return print_user_error(
                &format!("not subscribed to [{language}] {manga_id}"),
                json,
            );
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        let result = serde_json::json!({ "removed": removed });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} You will no longer be notified about [{}] {}.",
            style("ok").green(),
            style(&removed.language).yellow(),
            style(&removed.manga_title).cyan().bold(),
        );
        println!();
    }

    Ok(())
}

pub async fn unsubscribe_all(state: &AppState, recipient: &Recipient, json: bool) -> Result<()> {
    state.subscription_service.unsubscribe_all(recipient).await?;

    if json {
        let result = serde_json::json!({ "recipient": recipient, "removed_all": true });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Removed every subscription of '{}'.",
            style("ok").green(),
            style(recipient).cyan(),
        );
        println!();
    }

    Ok(())
}

pub async fn list(state: &AppState, recipient: &Recipient, json: bool) -> Result<()> {
    let subscriptions = state.subscription_service.list(recipient).await?;

    if json {
        let result = serde_json::json!({
            "recipient": recipient,
            "subscriptions": subscriptions,
            "count": subscriptions.len(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if subscriptions.is_empty() {
        println!();
        println!(
            "  {} No active subscriptions.",
            style("i").blue().bold(),
        );
        println!("     Add one with: mwatch subscribe <manga> --lang <code>");
        println!();
        return Ok(());
    }

    println!();
    println!("  Titles you follow ({})", subscriptions.len());
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("Language").fg(Color::White),
        Cell::new("Manga ID").fg(Color::White),
    ]);

    for sub in &subscriptions {
        table.add_row(vec![
            Cell::new(&sub.manga_title).fg(Color::Cyan),
            Cell::new(&sub.language).fg(Color::Yellow),
            Cell::new(&sub.manga_id).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!();

    Ok(())
}

pub async fn manga(state: &AppState, manga: &str, json: bool) -> Result<()> {
    let manga_id = resolve_manga_id(manga)?;
    let manga = match state.subscription_service.manga(&manga_id).await {
        Ok(manga) => manga,
        Err(e) if e.is_user_facing() => return print_user_error(&e, json),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&manga)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(manga.display_title()).cyan().bold());
    println!("  {} {}", style("id:").dim(), manga.id);
    let languages = if manga.available_languages.is_empty() {
        "(none)".to_string()
    } else {
        manga.available_languages.join(", ")
    };
    println!("  {} {}", style("languages:").dim(), languages);
    println!();

    Ok(())
}

pub async fn updates(state: &AppState, json: bool) -> Result<()> {
    let updates = state
        .subscription_service
        .updates(&CancellationToken::new())
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updates)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!();
        println!("  {} No new chapters.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    for update in &updates {
        println!(
            "  [{}] {} ({} recipients)",
            style(&update.language).yellow(),
            style(&update.manga_title).cyan().bold(),
            update.recipients.len(),
        );
        for chapter in &update.new_chapters {
            println!(
                "    {} {}",
                style("-").dim(),
                chapter_label(chapter),
            );
            println!(
                "      {}",
                style(chapter.read_link(&state.config.reader_base_url)).dim()
            );
        }
        println!();
    }

    Ok(())
}
