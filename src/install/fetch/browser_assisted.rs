use crate::error::{AppError, Result};
use crate::install::fetch::{self, FetchRequest, FetchStrategy, ProgressCallback};
use crate::state::event_state::InstallationHandle;
use crate::utils::path_utils;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tauri::webview::DownloadEvent;
use tauri::{Manager, WebviewUrl, WebviewWindowBuilder};
use tokio::fs;
use tokio::sync::mpsc;
use url::Url;

/// How long the user gets to click through the host's pages before the
/// surface is abandoned.
const INTERACTION_TIMEOUT_SECS: u64 = 300;

enum SurfaceEvent {
    DownloadStarted,
    DownloadFinished { success: bool },
}

/// Opens the source URL in a scoped webview window and intercepts the
/// native download it triggers, redirecting it to the temp archive path.
/// The surface disappears as soon as the download is running.
pub struct BrowserAssistedFetch;

#[async_trait]
impl FetchStrategy for BrowserAssistedFetch {
    fn name(&self) -> &'static str {
        "browser_assisted"
    }

    async fn fetch(
        &self,
        app: &tauri::AppHandle,
        request: &FetchRequest,
        handle: &InstallationHandle,
        on_progress: ProgressCallback,
    ) -> Result<PathBuf> {
        let source_url = Url::parse(&request.source_url)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", request.source_url, e)))?;
        let temp_path = path_utils::temp_archive_path(&request.display_name);
        let label = format!("fetch-{}", handle.invocation_id.as_simple());

        info!(
            "Opening browser surface '{}' for {} -> {:?}",
            label, source_url, temp_path
        );

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SurfaceEvent>();
        let destination = temp_path.clone();

        WebviewWindowBuilder::new(app, &label, WebviewUrl::External(source_url))
            .title(format!("{} - Download", request.display_name))
            .inner_size(1080.0, 720.0)
            .center()
            .always_on_top(true)
            .on_download(move |_webview, event| {
                match event {
                    DownloadEvent::Requested { destination: dest, .. } => {
                        *dest = destination.clone();
                        let _ = events_tx.send(SurfaceEvent::DownloadStarted);
                    }
                    DownloadEvent::Finished { success, .. } => {
                        let _ = events_tx.send(SurfaceEvent::DownloadFinished { success });
                    }
                    _ => {}
                }
                true
            })
            .build()?;

        let outcome = wait_for_download(app, &label, &temp_path, handle, &mut events_rx).await;

        if let Some(window) = app.get_webview_window(&label) {
            if let Err(e) = window.close() {
                warn!("Failed to close browser surface '{}': {}", label, e);
            }
        }

        match outcome {
            Ok(()) => {
                if let Some(expected) = &request.expected_sha256 {
                    if let Err(e) = fetch::verify_archive_checksum(&temp_path, expected).await {
                        remove_partial(&temp_path).await;
                        return Err(e);
                    }
                }
                if let Ok(metadata) = fs::metadata(&temp_path).await {
                    on_progress(metadata.len(), Some(metadata.len()));
                }
                Ok(temp_path)
            }
            Err(e) => {
                remove_partial(&temp_path).await;
                Err(e)
            }
        }
    }
}

async fn wait_for_download(
    app: &tauri::AppHandle,
    label: &str,
    temp_path: &Path,
    handle: &InstallationHandle,
    events_rx: &mut mpsc::UnboundedReceiver<SurfaceEvent>,
) -> Result<()> {
    let interaction_deadline =
        Instant::now() + Duration::from_secs(INTERACTION_TIMEOUT_SECS);
    let mut download_started = false;

    loop {
        if handle.is_cancelled() {
            return Err(AppError::FetchError(
                "Download was cancelled by the user".to_string(),
            ));
        }

        match tokio::time::timeout(Duration::from_millis(500), events_rx.recv()).await {
            Ok(Some(SurfaceEvent::DownloadStarted)) => {
                info!("Download started in browser surface '{}'", label);
                download_started = true;
                // The webview owns the transfer, so it must stay alive
                // until the download finishes. Hide it instead of closing.
                if let Some(window) = app.get_webview_window(label) {
                    if let Err(e) = window.hide() {
                        warn!("Failed to hide browser surface '{}': {}", label, e);
                    }
                }
            }
            Ok(Some(SurfaceEvent::DownloadFinished { success })) => {
                debug!(
                    "Browser surface '{}' reported download finished (success: {})",
                    label, success
                );
                return if success && temp_path.exists() {
                    Ok(())
                } else {
                    Err(AppError::FetchError(
                        "Download failed in the browser surface".to_string(),
                    ))
                };
            }
            Ok(None) => {
                return Err(AppError::FetchError(
                    "Browser surface went away unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                if !download_started {
                    if app.get_webview_window(label).is_none() {
                        return Err(AppError::FetchError(
                            "Browser surface was closed before the download started".to_string(),
                        ));
                    }
                    if Instant::now() >= interaction_deadline {
                        return Err(AppError::FetchError(format!(
                            "No download started within {}s",
                            INTERACTION_TIMEOUT_SECS
                        )));
                    }
                }
            }
        }
    }
}

async fn remove_partial(temp_path: &Path) {
    if !temp_path.exists() {
        return;
    }
    match fs::remove_file(temp_path).await {
        Ok(()) => debug!("Removed partial download {:?}", temp_path),
        Err(e) => warn!("Failed to remove partial download {:?}: {}", temp_path, e),
    }
}
