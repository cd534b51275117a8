//! Global configuration loader for mangawatch.
//!
//! Reads `config.toml` from the data directory (`~/.mangawatch/` in
//! production) and deserializes it into [`GlobalConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mangawatch_types::config::GlobalConfig;

use crate::sqlite::pool::default_database_url;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "MANGAWATCH_DATA_DIR";

/// Shortest accepted poll interval.
const MIN_POLL_INTERVAL_SECS: u64 = 60;

/// Data directory: `MANGAWATCH_DATA_DIR`, falling back to `~/.mangawatch`.
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => match dirs::home_dir() {
            Some(home) => home.join(".mangawatch"),
            None => PathBuf::from(".mangawatch"),
        },
    }
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`GlobalConfig::default()`].
/// - Unreadable or malformed file: a warning is logged and the default used.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Poll interval with a floor of one minute.
pub fn resolve_poll_interval(config: &GlobalConfig) -> Duration {
    Duration::from_secs(config.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
}

/// Database url: the configured one, else `{data_dir}/mangawatch.db`.
pub fn resolve_database_url(config: &GlobalConfig, data_dir: &Path) -> String {
    config
        .database_url
        .clone()
        .unwrap_or_else(|| default_database_url(data_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.poll_interval_secs, 900);
        assert!(config.database_url.is_none());
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
poll_interval_secs = 120
reader_base_url = "https://reader.example"
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.poll_interval_secs, 120);
        assert_eq!(config.reader_base_url, "https://reader.example");
        assert_eq!(config.feed_limit, 20);
    }

    #[tokio::test]
    async fn load_global_config_malformed_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "poll_interval_secs = \"soon\"")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.poll_interval_secs, 900);
    }

    #[test]
    fn resolve_poll_interval_enforces_floor() {
        let mut config = GlobalConfig::default();
        assert_eq!(resolve_poll_interval(&config), Duration::from_secs(900));

        config.poll_interval_secs = 5;
        assert_eq!(resolve_poll_interval(&config), Duration::from_secs(60));
    }

    #[test]
    fn resolve_database_url_prefers_config() {
        let dir = Path::new("/data");
        let mut config = GlobalConfig::default();
        assert_eq!(
            resolve_database_url(&config, dir),
            "sqlite:///data/mangawatch.db"
        );

        config.database_url = Some("sqlite:///elsewhere.db".to_string());
        assert_eq!(resolve_database_url(&config, dir), "sqlite:///elsewhere.db");
    }
}
