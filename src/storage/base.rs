use std::sync::Arc;

use async_trait::async_trait;
use cookie::Cookie;
use tracing::{info, warn};

use super::{file_jar::FileJar, memory_jar::MemoryJar, no_jar::NoJar};
use crate::config::{StorageBackend, StorageConfig};

/// The CookieJar trait abstracts the persisted key-value medium tokens live in.
///
/// Implementations must treat a cookie whose `Expires` has passed as absent.
#[async_trait]
pub trait CookieJar: Send + Sync {
    async fn set(&self, cookie: Cookie<'static>) -> Result<(), String>;
    async fn get(&self, name: &str) -> Result<Option<Cookie<'static>>, String>;
    /// Removing a cookie that does not exist is not an error.
    async fn remove(&self, name: &str) -> Result<(), String>;
    fn is_available(&self) -> bool {
        // Real jars are always available; NoJar returns false
        // so the token store can explain why nothing persists.
        true
    }
}

/// Creates a concrete jar based on the StorageConfig.
///
/// A disabled config, or a file jar whose location cannot be prepared,
/// yields NoJar so that every token operation degrades to a no-op.
pub async fn create_jar(config: &StorageConfig) -> Arc<dyn CookieJar> {
    if !config.enabled {
        info!("Cookie storage is disabled. Using NoJar.");
        return Arc::new(NoJar::new());
    }

    match &config.backend {
        Some(StorageBackend::Memory) => {
            info!("Using in-memory cookie jar.");
            Arc::new(MemoryJar::new())
        }
        Some(StorageBackend::File(file_config)) => match FileJar::open(&file_config.path).await {
            Ok(jar) => {
                info!("Using cookie file at '{}'.", file_config.path);
                Arc::new(jar)
            }
            Err(e) => {
                warn!(
                    "Cookie file '{}' is unusable ({}); tokens will not be persisted.",
                    file_config.path, e
                );
                Arc::new(NoJar::new())
            }
        },
        None => {
            warn!("Storage is enabled but no backend is configured; using in-memory jar.");
            Arc::new(MemoryJar::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileJarConfig;

    #[tokio::test]
    async fn test_disabled_storage_yields_unavailable_jar() {
        let jar = create_jar(&StorageConfig {
            enabled: false,
            backend: Some(StorageBackend::Memory),
        })
        .await;
        assert!(!jar.is_available());
    }

    #[tokio::test]
    async fn test_unusable_file_path_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let path = blocker.join("cookies.txt");

        let jar = create_jar(&StorageConfig {
            enabled: true,
            backend: Some(StorageBackend::File(FileJarConfig {
                path: path.to_string_lossy().to_string(),
            })),
        })
        .await;
        assert!(!jar.is_available());
    }

    #[tokio::test]
    async fn test_missing_backend_falls_back_to_memory() {
        let jar = create_jar(&StorageConfig {
            enabled: true,
            backend: None,
        })
        .await;
        assert!(jar.is_available());
    }
}
