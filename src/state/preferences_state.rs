use crate::error::Result;
use crate::state::post_init::PostInitializationHandler;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

/// Persistent key-value store for the UI and the install bookkeeping.
///
/// Holds the session token, the cached user payload, per-mod install
/// records (`installPath_<slug>`, `installStatus_<slug>`) and the quick
/// launch list, all in one JSON file.
pub struct PreferenceStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
    store_path: PathBuf,
    save_lock: Mutex<()>,
}

impl PreferenceStore {
    pub fn new(store_path: PathBuf) -> Result<Self> {
        info!(
            "PreferenceStore: Initializing with path: {:?} (loading deferred)",
            store_path
        );

        Ok(Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            store_path,
            save_lock: Mutex::new(()),
        })
    }

    async fn load_internal(&self) -> Result<()> {
        if !self.store_path.exists() {
            info!("Preference file not found, starting with an empty store");
            return Ok(());
        }

        let data = fs::read_to_string(&self.store_path).await?;

        match serde_json::from_str::<HashMap<String, Value>>(&data) {
            Ok(loaded) => {
                debug!("Loaded {} preference entries", loaded.len());
                let mut entries = self.entries.write().await;
                *entries = loaded;
            }
            Err(e) => {
                error!("Failed to parse preference file: {}", e);
                warn!("Preference file is corrupted, creating backup and starting empty");

                let backup_path = self.store_path.with_extension("json.corrupted");
                if let Err(backup_err) = fs::copy(&self.store_path, &backup_path).await {
                    error!("Failed to backup corrupted preferences: {}", backup_err);
                } else {
                    info!("Backed up corrupted preferences to: {:?}", backup_path);
                }
            }
        }

        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;

        if let Some(parent_dir) = self.store_path.parent() {
            if !parent_dir.exists() {
                fs::create_dir_all(parent_dir).await?;
            }
        }

        let data = {
            let entries = self.entries.read().await;
            serde_json::to_string_pretty(&*entries)?
        };

        fs::write(&self.store_path, data).await?;
        debug!("Saved preferences to {:?}", self.store_path);

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .await
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        {
            let mut entries = self.entries.write().await;
            entries.insert(key.to_string(), value);
        }
        self.save().await
    }

    /// Writes several keys under one lock and persists them in a single
    /// save, so related records (install status + install path) never hit
    /// disk half-written.
    pub async fn set_many(&self, pairs: Vec<(String, Value)>) -> Result<()> {
        {
            let mut entries = self.entries.write().await;
            for (key, value) in pairs {
                entries.insert(key, value);
            }
        }
        self.save().await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let removed = {
            let mut entries = self.entries.write().await;
            entries.remove(key).is_some()
        };

        if removed {
            self.save().await?;
        } else {
            debug!("Preference key '{}' not present, nothing to delete", key);
        }

        Ok(())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl PostInitializationHandler for PreferenceStore {
    async fn on_state_ready(&self, _app_handle: Arc<tauri::AppHandle>) -> Result<()> {
        info!("PreferenceStore: on_state_ready called. Loading preferences...");
        self.load_internal().await?;
        Ok(())
    }
}
