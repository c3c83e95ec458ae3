use crate::config::{ProjectDirsExt, LAUNCHER_DIRECTORY};
use crate::error::Result;
use crate::state::post_init::PostInitializationHandler;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

const CONFIG_FILENAME: &str = "studio_config.json";
const CONFIG_CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub is_experimental: bool,
    #[serde(default = "default_auto_check_updates")]
    pub auto_check_updates: bool,
    /// Seconds without a received chunk before a running fetch is aborted.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Hosts whose downloads need an interactive browser surface.
    #[serde(default)]
    pub browser_assisted_hosts: Vec<String>,
    /// Optional command the game executable is passed through on launch
    /// (compatibility layers on non-Windows systems).
    #[serde(default)]
    pub launch_wrapper: Option<String>,
}

fn default_config_version() -> u32 {
    CONFIG_CURRENT_VERSION
}

fn default_auto_check_updates() -> bool {
    true
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_CURRENT_VERSION,
            is_experimental: false,
            auto_check_updates: true,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            browser_assisted_hosts: Vec::new(),
            launch_wrapper: None,
        }
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<LauncherConfig>>,
    config_path: PathBuf,
    save_lock: Mutex<()>,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_path = LAUNCHER_DIRECTORY.root_dir().join(CONFIG_FILENAME);
        info!(
            "ConfigManager: Initializing with path: {:?} (config loading deferred)",
            config_path
        );

        Ok(Self {
            config: Arc::new(RwLock::new(LauncherConfig::default())),
            config_path,
            save_lock: Mutex::new(()),
        })
    }

    async fn load_config_internal(&self) -> Result<()> {
        if !self.config_path.exists() {
            info!("Config file not found, using default configuration");
            self.save_config().await?;
            return Ok(());
        }

        info!(
            "Loading launcher configuration from: {:?}",
            self.config_path
        );
        let config_data = fs::read_to_string(&self.config_path).await?;

        match serde_json::from_str::<LauncherConfig>(&config_data) {
            Ok(loaded_config) => {
                info!("Successfully loaded launcher configuration");
                debug!("Loaded config: {:?}", loaded_config);

                let mut config = self.config.write().await;
                *config = loaded_config;
            }
            Err(e) => {
                error!("Failed to parse config file: {}", e);
                warn!("Config file is corrupted, creating backup and using defaults");

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(backup_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!("Failed to backup corrupted config: {}", backup_err);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                self.save_config().await?;
            }
        }

        Ok(())
    }

    pub async fn save_config(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        debug!("Acquired save lock, proceeding to save config...");

        if let Some(parent_dir) = self.config_path.parent() {
            if !parent_dir.exists() {
                fs::create_dir_all(parent_dir).await?;
            }
        }

        let config = self.config.read().await;
        let config_data = serde_json::to_string_pretty(&*config)?;

        fs::write(&self.config_path, config_data).await?;
        info!(
            "Successfully saved launcher configuration to: {:?}",
            self.config_path
        );

        Ok(())
    }

    pub async fn get_config(&self) -> LauncherConfig {
        self.config.read().await.clone()
    }

    pub async fn set_config(&self, new_config: LauncherConfig) -> Result<()> {
        let should_save = {
            let mut config = self.config.write().await;

            if *config == new_config {
                debug!("No config changes detected, skipping save");
                false
            } else {
                // Preserve version during replacement
                let version = config.version;

                if config.auto_check_updates != new_config.auto_check_updates {
                    info!(
                        "Changing auto check updates: {} -> {}",
                        config.auto_check_updates, new_config.auto_check_updates
                    );
                }
                if config.fetch_timeout_secs != new_config.fetch_timeout_secs {
                    info!(
                        "Changing fetch timeout: {}s -> {}s",
                        config.fetch_timeout_secs, new_config.fetch_timeout_secs
                    );
                }
                if config.launch_wrapper != new_config.launch_wrapper {
                    info!(
                        "Changing launch wrapper: {:?} -> {:?}",
                        config.launch_wrapper, new_config.launch_wrapper
                    );
                }

                *config = LauncherConfig {
                    version,
                    ..new_config
                };

                true
            }
        };

        if should_save {
            self.save_config().await?;
        }

        Ok(())
    }
}

#[async_trait]
impl PostInitializationHandler for ConfigManager {
    async fn on_state_ready(&self, _app_handle: Arc<tauri::AppHandle>) -> Result<()> {
        info!("ConfigManager: on_state_ready called. Loading configuration...");
        self.load_config_internal().await?;
        info!("ConfigManager: Successfully loaded configuration in on_state_ready.");
        Ok(())
    }
}
