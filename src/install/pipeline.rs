use crate::error::{AppError, Result};
use crate::install::archive;
use crate::install::fetch::{self, FetchRequest, ProgressCallback};
use crate::state::event_state::{InstallationHandle, InstallationStatus};
use crate::state::quick_launch_state::QuickLaunchEntry;
use crate::state::state_manager::State;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Everything needed to install one package.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    pub slug: String,
    pub source_reference: String,
    pub display_name: String,
    pub target_directory: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_ref: Option<String>,
    /// SHA256 the catalog reports for the archive, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_sha256: Option<String>,
}

/// Outcome handed back to the invoking UI call. Pipeline failures land
/// here as a message instead of a rejected command; the status channel is
/// the UI's source of truth either way.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstallResult {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Runs the full install pipeline for one package: fetch the archive,
/// extract it into the target directory, record the install and promote
/// the package into quick launch.
///
/// Exactly one terminal status event is emitted per accepted invocation.
/// A second request for a slug whose install is still pending is rejected
/// without starting an invocation.
pub async fn run_install(app: tauri::AppHandle, request: InstallRequest) -> InstallResult {
    let state = match State::get().await {
        Ok(state) => state,
        Err(e) => return InstallResult::failed(format!("Launcher state unavailable: {}", e)),
    };

    let handle = match state.event_state.begin_installation(&request.slug) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Rejected install for '{}': {}", request.slug, e);
            return InstallResult::failed(e.to_string());
        }
    };

    info!(
        "Starting install invocation {} for '{}' from {}",
        handle.invocation_id, request.slug, request.source_reference
    );

    match execute(&app, &state, &request, &handle).await {
        Ok(()) => {
            let message = format!("{} installed successfully!", request.display_name);
            if let Err(e) = state
                .event_state
                .emit_status(&handle, InstallationStatus::Success { message })
            {
                warn!(
                    "Failed to emit success status for '{}': {}",
                    request.slug, e
                );
            }
            InstallResult::ok()
        }
        Err(e) => {
            let message = e.to_string();
            error!("Install for '{}' failed: {}", request.slug, message);
            if let Err(emit_err) = state.event_state.emit_status(
                &handle,
                InstallationStatus::Error {
                    message: message.clone(),
                },
            ) {
                warn!(
                    "Failed to emit error status for '{}': {}",
                    request.slug, emit_err
                );
            }
            InstallResult::failed(message)
        }
    }
}

async fn execute(
    app: &tauri::AppHandle,
    state: &Arc<State>,
    request: &InstallRequest,
    handle: &InstallationHandle,
) -> Result<()> {
    let events = state.event_state.clone();
    events.emit_status(
        handle,
        InstallationStatus::Downloading {
            progress: Some(0.0),
            received_bytes: None,
        },
    )?;

    let config = state.config_manager.get_config().await;
    let strategy = fetch::select_strategy(&request.source_reference, &config);
    info!(
        "Using fetch strategy '{}' for '{}'",
        strategy.name(),
        request.slug
    );

    let fetch_request = FetchRequest {
        source_url: request.source_reference.clone(),
        display_name: request.display_name.clone(),
        timeout_secs: config.fetch_timeout_secs,
        expected_sha256: request.archive_sha256.clone(),
    };

    let progress_events = events.clone();
    let progress_handle = handle.clone();
    let last_bucket = Arc::new(AtomicU64::new(0));
    let on_progress: ProgressCallback = Arc::new(move |received, total| {
        if let Some(snapshot) = progress_snapshot(received, total, &last_bucket) {
            if let Err(e) = progress_events.emit_status(&progress_handle, snapshot) {
                warn!("Failed to emit download progress: {}", e);
            }
        }
    });

    let archive_path = strategy.fetch(app, &fetch_request, handle, on_progress).await?;

    finish_with_archive(state, request, handle, &archive_path).await
}

/// Runs the post-fetch phase. The fetched archive is consumed whichever
/// way extraction goes, so a failing step never strands a temp file.
async fn finish_with_archive(
    state: &Arc<State>,
    request: &InstallRequest,
    handle: &InstallationHandle,
    archive_path: &Path,
) -> Result<()> {
    let result = extract_and_record(state, request, handle, archive_path).await;
    archive::remove_archive(archive_path).await;
    result
}

async fn extract_and_record(
    state: &Arc<State>,
    request: &InstallRequest,
    handle: &InstallationHandle,
    archive_path: &Path,
) -> Result<()> {
    if handle.is_cancelled() {
        return Err(AppError::FetchError(
            "Download was cancelled by the user".to_string(),
        ));
    }

    let events = &state.event_state;
    events.emit_status(handle, InstallationStatus::Extracting)?;

    let files_written = archive::install_archive(archive_path, &request.target_directory).await?;
    info!("Installed {} files for '{}'", files_written, request.slug);

    events.emit_status(handle, InstallationStatus::Copying)?;

    state
        .install_tracker
        .mark_installed(&request.slug, &request.target_directory)
        .await?;

    let entry = QuickLaunchEntry {
        slug: request.slug.clone(),
        display_name: request.display_name.clone(),
        cover_image_ref: request.cover_image_ref.clone(),
        install_path: request.target_directory.to_string_lossy().to_string(),
    };
    if let Err(e) = state.quick_launch_manager.promote(entry).await {
        // Quick launch is cosmetic, a failed promotion must not fail the install
        warn!(
            "Failed to promote '{}' into quick launch: {}",
            request.slug, e
        );
    }

    Ok(())
}

/// Turns a raw progress callback into a status snapshot, deduplicated so
/// the channel is not flooded with one event per chunk. With a known
/// total, an event goes out when the integer percent advances; without
/// one, every mebibyte.
fn progress_snapshot(
    received: u64,
    total: Option<u64>,
    last_bucket: &AtomicU64,
) -> Option<InstallationStatus> {
    match total {
        Some(total) if total > 0 => {
            let percent = ((received as f64 / total as f64) * 100.0).min(100.0);
            let bucket = percent as u64;
            if last_bucket.swap(bucket, Ordering::Relaxed) == bucket {
                return None;
            }
            Some(InstallationStatus::Downloading {
                progress: Some(percent),
                received_bytes: Some(received),
            })
        }
        _ => {
            let bucket = received / (1024 * 1024);
            if last_bucket.swap(bucket, Ordering::Relaxed) == bucket {
                return None;
            }
            Some(InstallationStatus::Downloading {
                progress: None,
                received_bytes: Some(received),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::config_state::ConfigManager;
    use crate::state::event_state::EventState;
    use crate::state::install_state::InstallStateTracker;
    use crate::state::intent_state::IntentQueue;
    use crate::state::preferences_state::PreferenceStore;
    use crate::state::quick_launch_state::QuickLaunchManager;
    use async_zip::tokio::write::ZipFileWriter;
    use async_zip::{Compression, ZipEntryBuilder};
    use tokio::fs;

    fn test_state(dir: &Path) -> Arc<State> {
        let store = Arc::new(PreferenceStore::new(dir.join("preferences.json")).unwrap());
        Arc::new(State {
            config_manager: ConfigManager::new().unwrap(),
            preference_store: store.clone(),
            install_tracker: InstallStateTracker::new(store.clone()),
            quick_launch_manager: QuickLaunchManager::new(store.clone()),
            event_state: EventState::new(None),
            intent_queue: IntentQueue::new(),
        })
    }

    fn request_for(target: &Path) -> InstallRequest {
        InstallRequest {
            slug: "demo-mod".to_string(),
            source_reference: "https://cdn.example.com/mods/demo.zip".to_string(),
            display_name: "Demo Mod".to_string(),
            target_directory: target.to_path_buf(),
            cover_image_ref: None,
            archive_sha256: None,
        }
    }

    async fn write_fixture_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut file = fs::File::create(path).await.unwrap();
        let mut writer = ZipFileWriter::with_tokio(&mut file);
        for (name, data) in entries {
            let builder = ZipEntryBuilder::new((*name).to_string().into(), Compression::Deflate);
            writer.write_entry_whole(builder, data).await.unwrap();
        }
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn successful_install_records_state_and_consumes_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let archive = dir.path().join("demo.zip");
        write_fixture_zip(&archive, &[("mod/data.txt", b"payload".as_slice())]).await;

        let target = dir.path().join("games").join("Demo");
        let request = request_for(&target);
        let handle = state.event_state.begin_installation(&request.slug).unwrap();

        finish_with_archive(&state, &request, &handle, &archive)
            .await
            .unwrap();

        assert!(!archive.exists());
        assert_eq!(
            fs::read(target.join("mod/data.txt")).await.unwrap(),
            b"payload"
        );
        assert!(state.install_tracker.is_installed("demo-mod").await);
        assert_eq!(
            state.install_tracker.install_path("demo-mod").await,
            Some(target.to_string_lossy().to_string())
        );

        let quick_launch = state.quick_launch_manager.list().await;
        assert_eq!(quick_launch.len(), 1);
        assert_eq!(quick_launch[0].slug, "demo-mod");
    }

    #[tokio::test]
    async fn failed_extraction_consumes_the_archive_and_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file").await.unwrap();

        let target = dir.path().join("games").join("Demo");
        let request = request_for(&target);
        let handle = state.event_state.begin_installation(&request.slug).unwrap();

        let result = finish_with_archive(&state, &request, &handle, &archive).await;

        assert!(matches!(result, Err(AppError::ExtractError(_))));
        assert!(!archive.exists());
        assert!(!state.install_tracker.is_installed("demo-mod").await);
        assert!(state
            .install_tracker
            .install_path("demo-mod")
            .await
            .is_none());
        assert!(state.quick_launch_manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn cancellation_after_fetch_consumes_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let archive = dir.path().join("demo.zip");
        write_fixture_zip(&archive, &[("mod/data.txt", b"payload".as_slice())]).await;

        let request = request_for(&dir.path().join("games").join("Demo"));
        let handle = state.event_state.begin_installation(&request.slug).unwrap();
        state.event_state.cancel_installation(&request.slug);

        let result = finish_with_archive(&state, &request, &handle, &archive).await;

        assert!(matches!(result, Err(AppError::FetchError(_))));
        assert!(!archive.exists());
        assert!(!state.install_tracker.is_installed("demo-mod").await);
    }

    #[test]
    fn progress_events_are_deduplicated_per_percent() {
        let last = AtomicU64::new(0);

        // Still at 0%, nothing new to report
        assert!(progress_snapshot(10, Some(10_000), &last).is_none());
        assert!(progress_snapshot(90, Some(10_000), &last).is_none());

        // 1% crossed
        let snapshot = progress_snapshot(150, Some(10_000), &last);
        match snapshot {
            Some(InstallationStatus::Downloading {
                progress: Some(percent),
                received_bytes: Some(150),
            }) => assert!((percent - 1.5).abs() < f64::EPSILON),
            other => panic!("unexpected snapshot: {:?}", other),
        }

        // Same percent again is suppressed
        assert!(progress_snapshot(160, Some(10_000), &last).is_none());
    }

    #[test]
    fn unknown_total_reports_every_mebibyte() {
        let last = AtomicU64::new(0);

        assert!(progress_snapshot(512 * 1024, None, &last).is_none());

        let snapshot = progress_snapshot(2 * 1024 * 1024, None, &last);
        assert!(matches!(
            snapshot,
            Some(InstallationStatus::Downloading {
                progress: None,
                received_bytes: Some(_),
            })
        ));
    }

    #[test]
    fn percent_is_capped_at_one_hundred() {
        let last = AtomicU64::new(0);

        let snapshot = progress_snapshot(20_000, Some(10_000), &last);
        match snapshot {
            Some(InstallationStatus::Downloading {
                progress: Some(percent),
                ..
            }) => assert!((percent - 100.0).abs() < f64::EPSILON),
            other => panic!("unexpected snapshot: {:?}", other),
        }
    }

    #[test]
    fn install_result_omits_absent_error() {
        let json = serde_json::to_value(InstallResult::ok()).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(InstallResult::failed("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
    }
}
