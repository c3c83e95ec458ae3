use crate::error::{AppError, Result as AppResult};
use log::{error, info};
use serde::Serialize;
use tauri::{AppHandle, Emitter};
use tauri_plugin_updater::UpdaterExt;

#[derive(Clone, Serialize)]
struct UpdaterStatusPayload {
    message: String,
    status: String,
    progress: Option<u64>,
    total: Option<u64>,
    chunk: Option<u64>,
}

/// Pushes an updater status snapshot to the UI.
pub fn emit_status(
    app_handle: &AppHandle,
    status: &str,
    message: String,
    progress_info: Option<(u64, u64)>,
) {
    let payload = UpdaterStatusPayload {
        message,
        status: status.to_string(),
        progress: progress_info.map(|(chunk, total)| (chunk * 100 / total.max(1))),
        total: progress_info.map(|(_, total)| total),
        chunk: progress_info.map(|(chunk, _)| chunk),
    };
    if let Err(e) = app_handle.emit("updater_status", payload) {
        error!("Failed to emit updater status event: {}", e);
    }
}

/// Downloads and installs a found update, restarting the app afterwards
/// on platforms where the installer does not do that itself.
async fn handle_update(
    update: tauri_plugin_updater::Update,
    app_handle: AppHandle,
) -> AppResult<()> {
    emit_status(
        &app_handle,
        "pending",
        "Update found, preparing download...".to_string(),
        None,
    );

    let app_handle_progress = app_handle.clone();
    let mut total_downloaded: u64 = 0;

    let on_chunk = move |chunk_length: usize, content_length: Option<u64>| {
        total_downloaded += chunk_length as u64;

        match content_length {
            Some(total) => {
                emit_status(
                    &app_handle_progress,
                    "downloading",
                    format!("Downloading update: {} / {} bytes", total_downloaded, total),
                    Some((total_downloaded, total)),
                );
            }
            None => {
                let payload = UpdaterStatusPayload {
                    message: format!("Downloading update: {} bytes", total_downloaded),
                    status: "downloading".to_string(),
                    progress: None,
                    total: None,
                    chunk: Some(total_downloaded),
                };
                if let Err(e) = app_handle_progress.emit("updater_status", payload) {
                    error!("Failed to emit updater status event (no total): {}", e);
                }
            }
        }
    };
    let on_download_finish = || {
        info!("Download complete. Preparing installation...");
    };

    let bytes = update
        .download(on_chunk, on_download_finish)
        .await
        .map_err(|e| {
            error!("Update download failed: {}", e);
            AppError::Other(format!("Updater download error: {}", e))
        })?;
    info!(
        "Update download finished successfully ({} bytes).",
        bytes.len()
    );

    emit_status(
        &app_handle,
        "installing",
        "Installing update...".to_string(),
        None,
    );

    update.install(bytes).map_err(|e| {
        error!("Update installation failed: {}", e);
        AppError::Other(format!("Updater install error: {}", e))
    })?;

    emit_status(
        &app_handle,
        "finished",
        "Update installed successfully!".to_string(),
        None,
    );

    #[cfg(not(target_os = "windows"))]
    {
        info!("Attempting to restart the application (non-Windows)...");
        app_handle.restart();
    }

    Ok(())
}

/// Checks the configured endpoints for an application update and walks the
/// UI through the result via `updater_status` events.
pub async fn check_for_updates(app_handle: AppHandle) {
    let current_version = app_handle.package_info().version.to_string();
    let final_message: String;

    info!("Checking for updates (Current: {})", current_version);
    emit_status(
        &app_handle,
        "checking",
        "Checking for updates...".to_string(),
        None,
    );

    let updater = match app_handle.updater() {
        Ok(updater) => updater,
        Err(e) => {
            error!("Failed to build updater: {}", e);
            final_message = format!("Failed to build updater: {}", e);
            emit_status(&app_handle, "error", final_message.clone(), None);
            emit_status(&app_handle, "close", final_message, None);
            return;
        }
    };

    match updater.check().await {
        Ok(Some(update)) => {
            info!(
                "Update available: Version {}, Released: {:?}",
                update.version, update.date
            );
            emit_status(
                &app_handle,
                "pending",
                format!("Update {} found!", update.version),
                None,
            );

            match handle_update(update, app_handle.clone()).await {
                Ok(_) => {
                    final_message = "Update successful.".to_string();
                }
                Err(e) => {
                    final_message = format!("Update download/install failed: {}", e);
                    emit_status(&app_handle, "error", final_message.clone(), None);
                }
            }
        }
        Ok(None) => {
            info!("No update available.");
            final_message = "Application is up to date.".to_string();
            emit_status(&app_handle, "uptodate", final_message.clone(), None);
        }
        Err(e) => {
            error!("Error during update check: {}", e);
            final_message = format!("Update check error: {}", e);
            emit_status(&app_handle, "error", final_message.clone(), None);
        }
    }

    emit_status(&app_handle, "close", final_message.clone(), None);
    info!("Update check process fully completed: {}", final_message);
}
