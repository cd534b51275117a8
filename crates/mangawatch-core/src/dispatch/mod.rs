//! Periodic update detection and fan-out to recipients.

pub mod dispatcher;
pub mod notifier;
