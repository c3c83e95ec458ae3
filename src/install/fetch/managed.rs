use crate::error::Result;
use crate::install::fetch::{FetchRequest, FetchStrategy, ProgressCallback};
use crate::state::event_state::InstallationHandle;
use crate::utils::download_utils::{DownloadConfig, DownloadUtils};
use crate::utils::path_utils;
use async_trait::async_trait;
use log::{debug, info};
use std::path::PathBuf;
use std::time::Duration;

/// Fetches an archive through the shared download utility. This is the
/// default path for plain HTTP hosts and brings retries, cancellation and
/// an inactivity timeout.
pub struct ManagedDownloadFetch;

#[async_trait]
impl FetchStrategy for ManagedDownloadFetch {
    fn name(&self) -> &'static str {
        "managed"
    }

    async fn fetch(
        &self,
        _app: &tauri::AppHandle,
        request: &FetchRequest,
        handle: &InstallationHandle,
        on_progress: ProgressCallback,
    ) -> Result<PathBuf> {
        let temp_path = path_utils::temp_archive_path(&request.display_name);
        info!(
            "Managed download: {} -> {:?}",
            request.source_url, temp_path
        );

        let mut config = DownloadConfig::new()
            .with_force_overwrite(true)
            .with_retries(2)
            .with_cancel_flag(handle.cancel_flag())
            .with_inactivity_timeout(Duration::from_secs(request.timeout_secs))
            .with_progress_callback(move |received, total| on_progress(received, total));
        if let Some(expected) = &request.expected_sha256 {
            config = config.with_sha256(expected.clone());
        }

        DownloadUtils::download_file(&request.source_url, &temp_path, config).await?;
        debug!("Managed download finished: {:?}", temp_path);
        Ok(temp_path)
    }
}
