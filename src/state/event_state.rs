use crate::error::{AppError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tauri::Emitter;
use uuid::Uuid;

pub const INSTALLATION_STATUS_EVENT: &str = "installation-status";

/// Complete snapshot of an installation's state. The UI replaces its view
/// with every event; nothing is diffed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InstallationStatus {
    Idle,
    #[serde(rename_all = "camelCase")]
    Downloading {
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        received_bytes: Option<u64>,
    },
    Extracting,
    Copying,
    Success {
        message: String,
    },
    Error {
        message: String,
    },
}

impl InstallationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallationStatus::Success { .. } | InstallationStatus::Error { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatusEvent {
    pub invocation_id: Uuid,
    pub slug: String,
    #[serde(flatten)]
    pub status: InstallationStatus,
}

/// Per-invocation handle the pipeline carries through fetch and extract.
/// Cancellation is observed at chunk boundaries via the shared flag.
#[derive(Clone)]
pub struct InstallationHandle {
    pub invocation_id: Uuid,
    pub slug: String,
    cancel_flag: Arc<AtomicBool>,
}

impl InstallationHandle {
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Shared flag for collaborators (download manager) that observe
    /// cancellation themselves.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }
}

#[derive(Clone)]
struct InvocationInfo {
    invocation_id: Uuid,
    cancel_flag: Arc<AtomicBool>,
    start_time: std::time::SystemTime,
}

/// Owner of the `installation-status` channel.
///
/// Tracks one active invocation per slug; a second install for the same
/// slug is rejected while the first is pending. Terminal events tear the
/// invocation down, after which the slug is free again.
#[derive(Clone)]
pub struct EventState {
    app: Option<Arc<tauri::AppHandle>>,
    // Shared across clones so the pipeline's progress callback observes
    // the same pending set as the command surface
    active_installs: Arc<DashMap<String, InvocationInfo>>,
}

impl EventState {
    pub fn new(app: Option<Arc<tauri::AppHandle>>) -> Self {
        info!("Initializing EventState...");
        Self {
            app,
            active_installs: Arc::new(DashMap::new()),
        }
    }

    /// Registers a new invocation for the slug. Fails while another
    /// invocation for the same slug is still pending.
    pub fn begin_installation(&self, slug: &str) -> Result<InstallationHandle> {
        match self.active_installs.entry(slug.to_string()) {
            Entry::Occupied(_) => Err(AppError::InstallInProgress(slug.to_string())),
            Entry::Vacant(vacant) => {
                let info = InvocationInfo {
                    invocation_id: Uuid::new_v4(),
                    cancel_flag: Arc::new(AtomicBool::new(false)),
                    start_time: std::time::SystemTime::now(),
                };
                let handle = InstallationHandle {
                    invocation_id: info.invocation_id,
                    slug: slug.to_string(),
                    cancel_flag: info.cancel_flag.clone(),
                };
                vacant.insert(info);
                debug!(
                    "Registered installation invocation {} for '{}'",
                    handle.invocation_id, slug
                );
                Ok(handle)
            }
        }
    }

    /// Emits a status snapshot for the invocation. A terminal status
    /// (success or error) removes the invocation from the active set, so
    /// nothing can be emitted for it afterwards.
    pub fn emit_status(
        &self,
        handle: &InstallationHandle,
        status: InstallationStatus,
    ) -> Result<()> {
        // Terminal teardown happens before delivery; a failed emit must
        // not leave the slug's pending slot occupied.
        if status.is_terminal() {
            if let Some((_, info)) = self.active_installs.remove(&handle.slug) {
                match info.start_time.elapsed() {
                    Ok(elapsed) => debug!(
                        "Installation invocation {} for '{}' finished after {:.1}s",
                        handle.invocation_id,
                        handle.slug,
                        elapsed.as_secs_f64()
                    ),
                    Err(_) => debug!(
                        "Installation invocation {} for '{}' finished",
                        handle.invocation_id, handle.slug
                    ),
                }
            }
        }

        let payload = InstallationStatusEvent {
            invocation_id: handle.invocation_id,
            slug: handle.slug.clone(),
            status,
        };

        if let Some(app) = &self.app {
            app.emit(INSTALLATION_STATUS_EVENT, &payload)
                .map_err(AppError::TauriError)?;
        }

        Ok(())
    }

    /// Flags the active invocation for the slug as cancelled. Returns
    /// false when no installation is pending for it.
    pub fn cancel_installation(&self, slug: &str) -> bool {
        match self.active_installs.get(slug) {
            Some(info) => {
                warn!("Cancellation requested for '{}'", slug);
                info.cancel_flag.store(true, Ordering::Relaxed);
                true
            }
            None => {
                debug!("Cancellation requested for '{}' but nothing is pending", slug);
                false
            }
        }
    }

    pub fn is_installing(&self, slug: &str) -> bool {
        self.active_installs.contains_key(slug)
    }
}
