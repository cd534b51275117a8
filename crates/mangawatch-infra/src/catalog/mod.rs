//! Catalog client backed by the MangaDex REST API.

pub mod mangadex;
pub mod types;
