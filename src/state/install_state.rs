use crate::error::Result;
use crate::state::preferences_state::PreferenceStore;
use log::info;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

const STATUS_INSTALLED: &str = "installed";

fn status_key(slug: &str) -> String {
    format!("installStatus_{}", slug)
}

fn path_key(slug: &str) -> String {
    format!("installPath_{}", slug)
}

/// Authoritative record of which mods are installed and where.
///
/// The record lives in the preference store; the filesystem is never
/// consulted. A directory deleted behind the launcher's back surfaces
/// later as a launch error, not here.
pub struct InstallStateTracker {
    store: Arc<PreferenceStore>,
}

impl InstallStateTracker {
    pub fn new(store: Arc<PreferenceStore>) -> Self {
        Self { store }
    }

    /// Marks a mod as installed. Status and path are persisted in one
    /// save, so an installed mod always carries its install path.
    pub async fn mark_installed(&self, slug: &str, install_path: &Path) -> Result<()> {
        info!(
            "Marking '{}' as installed at {}",
            slug,
            install_path.display()
        );
        self.store
            .set_many(vec![
                (
                    status_key(slug),
                    Value::String(STATUS_INSTALLED.to_string()),
                ),
                (
                    path_key(slug),
                    Value::String(install_path.to_string_lossy().to_string()),
                ),
            ])
            .await
    }

    pub async fn is_installed(&self, slug: &str) -> bool {
        self.store
            .get_string(&status_key(slug))
            .await
            .map(|s| s == STATUS_INSTALLED)
            .unwrap_or(false)
    }

    pub async fn install_path(&self, slug: &str) -> Option<String> {
        self.store.get_string(&path_key(slug)).await
    }

    pub async fn set_install_path(&self, slug: &str, install_path: &Path) -> Result<()> {
        self.store
            .set(
                &path_key(slug),
                Value::String(install_path.to_string_lossy().to_string()),
            )
            .await
    }

    /// Clears the installed flag only. The stored install path survives
    /// so a reinstall lands in the same directory.
    pub async fn reset(&self, slug: &str) -> Result<()> {
        info!("Resetting install state for '{}'", slug);
        self.store.delete(&status_key(slug)).await
    }
}
