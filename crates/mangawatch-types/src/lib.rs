//! Shared domain types for mangawatch.
//!
//! This crate contains the core domain types used across the workspace:
//! Manga, Chapter, Recipient, Language, Subscription, Topic, Update, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod manga;
pub mod subscription;
