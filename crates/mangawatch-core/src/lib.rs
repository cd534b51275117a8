//! Business logic and repository trait definitions for mangawatch.
//!
//! This crate defines the "ports" (repository, catalog, and notifier traits)
//! that the infrastructure layer implements, plus the services built on top
//! of them. It depends only on `mangawatch-types` -- never on
//! `mangawatch-infra` or any database/IO crate.

pub mod catalog;
pub mod dispatch;
pub mod repository;
pub mod service;

#[cfg(test)]
mod testing;
