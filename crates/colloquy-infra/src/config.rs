//! Configuration loader for Colloquy.
//!
//! Reads `config.toml` from the data directory (`~/.colloquy/` in production)
//! and deserializes it into [`ColloquyConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::Path;

use colloquy_types::config::ColloquyConfig;

use crate::filesystem::session_dir;
use crate::sqlite::pool::default_database_url;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ColloquyConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> ColloquyConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ColloquyConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ColloquyConfig::default();
        }
    };

    match toml::from_str::<ColloquyConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ColloquyConfig::default()
        }
    }
}

/// SQLite URL for the database backend: configured, or `{data_dir}/colloquy.db`.
pub fn resolve_database_url(config: &ColloquyConfig, data_dir: &Path) -> String {
    config
        .storage
        .database_url
        .clone()
        .unwrap_or_else(|| default_database_url(data_dir))
}

/// Directory for the file backend.
pub fn resolve_session_dir(config: &ColloquyConfig, data_dir: &Path) -> std::path::PathBuf {
    session_dir(data_dir, &config.storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::config::StorageBackend;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.chat.default_model, "gpt-4o");
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[storage]
backend = "database"

[chat]
default_provider = "local"
default_model = "llama3"

[[providers]]
name = "local"
base_url = "http://localhost:11434/v1"

[web_search]
max_results = 3
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.storage.backend, StorageBackend::Database);
        assert_eq!(config.chat.default_provider, "local");
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.web_search.max_results, 3);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert!(config.provider("openai").is_some());
    }

    #[test]
    fn resolve_database_url_prefers_configured() {
        let data_dir = Path::new("/data");
        let mut config = ColloquyConfig::default();
        assert_eq!(
            resolve_database_url(&config, data_dir),
            "sqlite:///data/colloquy.db"
        );

        config.storage.database_url = Some("sqlite:///elsewhere.db".to_string());
        assert_eq!(
            resolve_database_url(&config, data_dir),
            "sqlite:///elsewhere.db"
        );
    }

    #[test]
    fn resolve_session_dir_uses_storage_config() {
        let config = ColloquyConfig::default();
        assert_eq!(
            resolve_session_dir(&config, Path::new("/data")),
            std::path::PathBuf::from("/data/sessions")
        );
    }
}
