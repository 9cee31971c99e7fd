//! Application state wiring the session manager, model registry and
//! chat orchestrator together.
//!
//! The storage backend is chosen once here, from `[storage] backend` in
//! `config.toml`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use colloquy_core::chat::orchestrator::ChatOrchestrator;
use colloquy_core::llm::registry::ModelRegistry;
use colloquy_core::search::BoxWebSearch;
use colloquy_core::session::box_store::BoxSessionStore;
use colloquy_core::session::manager::SessionManager;
use colloquy_infra::config::{load_config, resolve_database_url, resolve_session_dir};
use colloquy_infra::filesystem::resolve_data_dir;
use colloquy_infra::filesystem::session_store::FileSessionStore;
use colloquy_infra::llm::ProviderModelFactory;
use colloquy_infra::search::TavilySearch;
use colloquy_infra::sqlite::pool::DatabasePool;
use colloquy_infra::sqlite::session::SqliteSessionStore;
use colloquy_types::config::{ColloquyConfig, StorageBackend};

/// Shared application state used by every command.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub orchestrator: ChatOrchestrator,
    pub config: ColloquyConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load config and open the session backend.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = load_config(&data_dir).await;
        Self::from_config(config, data_dir).await
    }

    pub async fn from_config(config: ColloquyConfig, data_dir: PathBuf) -> anyhow::Result<Self> {
        let store = match config.storage.backend {
            StorageBackend::File => {
                let dir = resolve_session_dir(&config, &data_dir);
                BoxSessionStore::new(FileSessionStore::new(dir))
            }
            StorageBackend::Database => {
                let url = resolve_database_url(&config, &data_dir);
                let pool = DatabasePool::new(&url).await?;
                BoxSessionStore::new(SqliteSessionStore::new(pool))
            }
        };
        let sessions = Arc::new(SessionManager::new(store));
        info!(backend = %sessions.backend_name(), "session storage ready");

        let models = Arc::new(ModelRegistry::with_factory(
            ProviderModelFactory::from_config(&config.providers),
        ));

        let mut orchestrator =
            ChatOrchestrator::new(Arc::clone(&sessions), models, config.chat.clone());
        match TavilySearch::from_config(&config.web_search) {
            Ok(search) => orchestrator = orchestrator.with_search(BoxWebSearch::new(search)),
            Err(e) => debug!(error = %e, "web search disabled"),
        }

        Ok(Self {
            sessions,
            orchestrator,
            config,
            data_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::session::NewSession;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_backend_by_default() {
        let tmp = TempDir::new().unwrap();
        let state = AppState::from_config(ColloquyConfig::default(), tmp.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(state.sessions.backend_name(), "file");

        let id = state
            .sessions
            .create(NewSession::new("chat", "alice"))
            .await
            .unwrap();
        assert!(tmp.path().join("sessions").join(format!("{id}.json")).exists());
    }

    #[tokio::test]
    async fn test_database_backend() {
        let tmp = TempDir::new().unwrap();
        let mut config = ColloquyConfig::default();
        config.storage.backend = StorageBackend::Database;
        let state = AppState::from_config(config, tmp.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(state.sessions.backend_name(), "sqlite");
        assert!(tmp.path().join("colloquy.db").exists());
    }
}
