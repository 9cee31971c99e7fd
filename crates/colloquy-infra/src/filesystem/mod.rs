//! Filesystem adapters for Colloquy.
//!
//! Provides the file-backed session store and helpers for the data
//! directory layout.

pub mod session_store;

use std::path::{Path, PathBuf};

use colloquy_types::config::StorageConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "COLLOQUY_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `COLLOQUY_DATA_DIR` environment variable
/// 2. `~/.colloquy`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".colloquy");
    }

    // Last resort: current directory
    PathBuf::from(".colloquy")
}

/// Directory holding session documents. Relative paths are taken from `data_dir`.
pub fn session_dir(data_dir: &Path, storage: &StorageConfig) -> PathBuf {
    let configured = Path::new(&storage.session_dir);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        data_dir.join(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_dir_relative_and_absolute() {
        let data_dir = PathBuf::from("/home/user/.colloquy");
        let mut storage = StorageConfig::default();
        assert_eq!(
            session_dir(&data_dir, &storage),
            PathBuf::from("/home/user/.colloquy/sessions")
        );

        storage.session_dir = "/var/lib/colloquy".to_string();
        assert_eq!(
            session_dir(&data_dir, &storage),
            PathBuf::from("/var/lib/colloquy")
        );
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-colloquy");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-colloquy"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
