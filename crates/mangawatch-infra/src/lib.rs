//! Infrastructure layer for mangawatch.
//!
//! Contains implementations of the traits defined in `mangawatch-core`:
//! SQLite storage, the MangaDex catalog client, delivery notifiers, and the
//! configuration loader.

pub mod catalog;
pub mod config;
pub mod notifier;
pub mod sqlite;
