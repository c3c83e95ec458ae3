use crate::error::Result;
use crate::state::post_init::PostInitializationHandler;
use crate::state::preferences_state::PreferenceStore;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tauri::Emitter;
use tokio::sync::{Mutex, RwLock};

pub const QUICK_LAUNCH_KEY: &str = "quickLaunchList";
pub const QUICK_LAUNCH_UPDATED_EVENT: &str = "quick-launch-updated";

/// The quick launch strip shows at most this many entries.
pub const MAX_QUICK_LAUNCH_ENTRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickLaunchEntry {
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub cover_image_ref: Option<String>,
    pub install_path: String,
}

/// Most-recently-used registry of launchable mods, capped at three.
///
/// Promotion deduplicates by slug, pushes to the front and evicts from
/// the tail. Observers are notified only after the list hit disk.
pub struct QuickLaunchManager {
    store: Arc<PreferenceStore>,
    app_handle: RwLock<Option<Arc<tauri::AppHandle>>>,
    promote_lock: Mutex<()>,
}

fn promoted(existing: Vec<QuickLaunchEntry>, entry: QuickLaunchEntry) -> Vec<QuickLaunchEntry> {
    let mut list: Vec<QuickLaunchEntry> = existing
        .into_iter()
        .filter(|e| e.slug != entry.slug)
        .collect();
    list.insert(0, entry);
    list.truncate(MAX_QUICK_LAUNCH_ENTRIES);
    list
}

impl QuickLaunchManager {
    pub fn new(store: Arc<PreferenceStore>) -> Self {
        Self {
            store,
            app_handle: RwLock::new(None),
            promote_lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Vec<QuickLaunchEntry> {
        match self.store.get(QUICK_LAUNCH_KEY).await {
            Some(value) => match serde_json::from_value::<Vec<QuickLaunchEntry>>(value) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Stored quick launch list is malformed, ignoring it: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }

    /// Moves (or inserts) the entry at the front of the list, persists the
    /// result and then emits the updated list to the UI.
    pub async fn promote(&self, entry: QuickLaunchEntry) -> Result<Vec<QuickLaunchEntry>> {
        let _guard = self.promote_lock.lock().await;

        info!("Promoting '{}' in the quick launch list", entry.slug);
        let updated = promoted(self.list().await, entry);

        self.store
            .set(QUICK_LAUNCH_KEY, serde_json::to_value(&updated)?)
            .await?;

        self.notify_observers(&updated).await;

        Ok(updated)
    }

    async fn notify_observers(&self, entries: &[QuickLaunchEntry]) {
        let handle_guard = self.app_handle.read().await;
        match handle_guard.as_ref() {
            Some(app) => {
                if let Err(e) = app.emit(QUICK_LAUNCH_UPDATED_EVENT, entries) {
                    warn!("Failed to emit quick launch update: {}", e);
                }
            }
            None => {
                debug!("Quick launch updated before UI was ready, no event emitted");
            }
        }
    }
}

#[async_trait]
impl PostInitializationHandler for QuickLaunchManager {
    async fn on_state_ready(&self, app_handle: Arc<tauri::AppHandle>) -> Result<()> {
        let mut handle_guard = self.app_handle.write().await;
        *handle_guard = Some(app_handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slug: &str) -> QuickLaunchEntry {
        QuickLaunchEntry {
            slug: slug.to_string(),
            display_name: slug.to_uppercase(),
            cover_image_ref: None,
            install_path: format!("/games/{}", slug),
        }
    }

    #[test]
    fn promoting_existing_slug_moves_it_to_front_without_duplicates() {
        let list = vec![entry("a"), entry("b"), entry("c")];
        let result = promoted(list, entry("b"));

        let slugs: Vec<&str> = result.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a", "c"]);
    }

    #[test]
    fn promoting_head_is_idempotent() {
        let list = vec![entry("a"), entry("b")];
        let result = promoted(list.clone(), entry("a"));
        assert_eq!(result, list);
    }

    #[test]
    fn list_never_exceeds_cap_and_evicts_least_recent() {
        let list = vec![entry("a"), entry("b"), entry("c")];
        let result = promoted(list, entry("d"));

        let slugs: Vec<&str> = result.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["d", "a", "b"]);
    }

    #[test]
    fn promotion_replaces_stale_entry_data() {
        let list = vec![entry("a")];
        let mut fresh = entry("a");
        fresh.install_path = "/games/elsewhere".to_string();

        let result = promoted(list, fresh.clone());
        assert_eq!(result, vec![fresh]);
    }
}
