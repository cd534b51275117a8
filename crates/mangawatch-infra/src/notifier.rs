//! JSON-lines notifier.
//!
//! Writes one JSON object per delivery to a writer (stdout in the binary),
//! so another process can pick notifications up from a pipe.

use std::io::Write;
use std::sync::Mutex;

use mangawatch_core::dispatch::notifier::{DeliveryOutcome, Notifier};
use mangawatch_types::manga::Chapter;
use mangawatch_types::subscription::{Language, Recipient, Update};
use serde::Serialize;

/// One rendered notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub manga_id: String,
    pub manga_title: String,
    pub language: Language,
    pub text: String,
    /// Read link of the first new chapter.
    pub link: Option<String>,
}

impl Notification {
    pub fn render(recipient: &Recipient, update: &Update, reader_base: &str) -> Self {
        let header = format!("[{}] {}", update.language, update.manga_title);
        let text = match update.new_chapters.as_slice() {
            [single] => format!("{header}\n\nNew chapter published: {}", chapter_label(single)),
            chapters => format!("{header}\n\n{} new chapters published!", chapters.len()),
        };

        Self {
            recipient: recipient.clone(),
            manga_id: update.manga_id.clone(),
            manga_title: update.manga_title.clone(),
            language: update.language.clone(),
            text,
            link: update.new_chapters.first().map(|c| c.read_link(reader_base)),
        }
    }
}

/// `Vol. 2, Ch. 10 - Title`, omitting whatever is empty.
pub fn chapter_label(chapter: &Chapter) -> String {
    let mut label = String::new();
    if !chapter.volume.is_empty() {
        label.push_str(&format!("Vol. {}", chapter.volume));
    }
    if !chapter.chapter.is_empty() {
        if !label.is_empty() {
            label.push_str(", ");
        }
        label.push_str(&format!("Ch. {}", chapter.chapter));
    }
    if !chapter.title.is_empty() {
        if !label.is_empty() {
            label.push_str(" - ");
        }
        label.push_str(&chapter.title);
    }
    label
}

/// Notifier emitting [`Notification`]s as JSON lines.
///
/// Write failures are reported as transient: the pipe belongs to the process,
/// not to the recipient.
pub struct JsonLinesNotifier<W: Write + Send> {
    out: Mutex<W>,
    reader_base: String,
}

impl JsonLinesNotifier<std::io::Stdout> {
    pub fn stdout(reader_base: impl Into<String>) -> Self {
        Self::new(std::io::stdout(), reader_base)
    }
}

impl<W: Write + Send> JsonLinesNotifier<W> {
    pub fn new(out: W, reader_base: impl Into<String>) -> Self {
        Self {
            out: Mutex::new(out),
            reader_base: reader_base.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, notification: &Notification) -> Result<(), String> {
        let line = serde_json::to_string(notification).map_err(|e| e.to_string())?;
        let mut out = self.out.lock().map_err(|_| "writer lock poisoned".to_string())?;
        writeln!(out, "{line}").map_err(|e| e.to_string())?;
        out.flush().map_err(|e| e.to_string())
    }
}

impl<W: Write + Send> Notifier for JsonLinesNotifier<W> {
    async fn deliver(&self, recipient: &Recipient, update: &Update) -> DeliveryOutcome {
        let notification = Notification::render(recipient, update, &self.reader_base);
        match self.write_line(&notification) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(reason) => DeliveryOutcome::TransientFailure(reason),
        }
    }
}
