//! Global configuration types for mangawatch.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! poll interval, catalog endpoints, and the database location.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.mangawatch/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Seconds between two update-detection passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Base url of the catalog REST API.
    #[serde(default = "default_catalog_base_url")]
    pub catalog_base_url: String,

    /// Base url of the human-facing reader, used to build chapter links.
    #[serde(default = "default_reader_base_url")]
    pub reader_base_url: String,

    /// Maximum feed entries requested per topic per pass.
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,

    /// Explicit database url. Defaults to `{data_dir}/mangawatch.db`.
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_poll_interval_secs() -> u64 {
    15 * 60
}

fn default_catalog_base_url() -> String {
    "https://api.mangadex.org".to_string()
}

fn default_reader_base_url() -> String {
    "https://mangadex.org".to_string()
}

fn default_feed_limit() -> u32 {
    20
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            catalog_base_url: default_catalog_base_url(),
            reader_base_url: default_reader_base_url(),
            feed_limit: default_feed_limit(),
            database_url: None,
        }
    }
}
