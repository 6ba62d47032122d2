//! Offline cache backends keyed by logical name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::CacheConfig;
use crate::error::StoreError;

pub fn dashboard_key(user_id: &str) -> String {
    format!("dashboard:{user_id}")
}

pub fn pending_changes_key(user_id: &str) -> String {
    format!("pending:{user_id}")
}

#[async_trait]
pub trait OfflineStore: Send + Sync {
    async fn get_offline_data(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set_offline_data(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove_offline_data(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store; also counts writes so callers can assert on them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl OfflineStore for MemoryStore {
    async fn get_offline_data(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set_offline_data(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_offline_data(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Builds the offline store named by `config`: file-backed under
/// `cache.directory` when one is set, in-memory otherwise.
pub fn open_store(config: &CacheConfig) -> Arc<dyn OfflineStore> {
    match config.directory.as_deref() {
        #[cfg(feature = "runtime")]
        Some(directory) => {
            tracing::debug!(directory = %directory.display(), "using file-backed offline store");
            Arc::new(FileStore::new(directory))
        }
        #[cfg(not(feature = "runtime"))]
        Some(directory) => {
            tracing::warn!(
                directory = %directory.display(),
                "file store needs the runtime feature, caching in memory"
            );
            Arc::new(MemoryStore::new())
        }
        None => Arc::new(MemoryStore::new()),
    }
}

#[cfg(feature = "runtime")]
pub use file::FileStore;

#[cfg(feature = "runtime")]
mod file {
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::fs;
    use uuid::Uuid;

    use super::OfflineStore;
    use crate::error::StoreError;

    /// One JSON document per key inside `root`.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        root: PathBuf,
    }

    impl FileStore {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        pub fn path_for(&self, key: &str) -> PathBuf {
            let file_name: String = key
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            self.root.join(format!("{file_name}.json"))
        }
    }

    #[async_trait]
    impl OfflineStore for FileStore {
        async fn get_offline_data(&self, key: &str) -> Result<Option<Value>, StoreError> {
            match fs::read(self.path_for(key)).await {
                Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            }
        }

        async fn set_offline_data(&self, key: &str, value: Value) -> Result<(), StoreError> {
            fs::create_dir_all(&self.root).await?;
            let target = self.path_for(key);
            let staging = target.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
            let bytes = serde_json::to_vec(&value)?;
            fs::write(&staging, bytes).await?;
            if let Err(err) = fs::rename(&staging, &target).await {
                let _ = fs::remove_file(&staging).await;
                return Err(err.into());
            }
            Ok(())
        }

        async fn remove_offline_data(&self, key: &str) -> Result<(), StoreError> {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        }
    }
}
