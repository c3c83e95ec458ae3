use crate::config::HTTP_CLIENT;
use crate::error::{AppError, Result};
use crate::utils::hash_utils;
use futures::stream::StreamExt;
use log::{debug, error, info, warn};
use reqwest::Response;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Configuration for managed file downloads
pub struct DownloadConfig {
    /// Expected SHA256 hash for verification (optional)
    pub expected_sha256: Option<String>,
    /// Whether to overwrite existing files even if they pass verification
    pub force_overwrite: bool,
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Progress callback function (received bytes, total bytes if known)
    pub progress_callback: Option<Box<dyn Fn(u64, Option<u64>) + Send + Sync>>,
    /// Abort signal, observed at chunk boundaries
    pub cancel_flag: Option<Arc<AtomicBool>>,
    /// Maximum time to wait for the next chunk before giving up
    pub inactivity_timeout: Option<Duration>,
}

impl std::fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("expected_sha256", &self.expected_sha256)
            .field("force_overwrite", &self.force_overwrite)
            .field("max_retries", &self.max_retries)
            .field("progress_callback", &"<callback function>")
            .field("cancel_flag", &self.cancel_flag.is_some())
            .field("inactivity_timeout", &self.inactivity_timeout)
            .finish()
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            expected_sha256: None,
            force_overwrite: false,
            max_retries: 3,
            progress_callback: None,
            cancel_flag: None,
            inactivity_timeout: None,
        }
    }
}

impl DownloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sha256<S: Into<String>>(mut self, sha256: S) -> Self {
        self.expected_sha256 = Some(sha256.into());
        self
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = Some(timeout);
        self
    }
}

/// Central download utility for robust file downloads
pub struct DownloadUtils;

impl DownloadUtils {
    /// Downloads a file from URL to target path with verification and retries
    pub async fn download_file<P: AsRef<Path>>(
        url: &str,
        target_path: P,
        config: DownloadConfig,
    ) -> Result<()> {
        let target_path = target_path.as_ref();
        debug!("Starting download: {} -> {:?}", url, target_path);

        // Check if file already exists and is valid
        if !config.force_overwrite && Self::verify_existing_file(target_path, &config).await? {
            info!(
                "File already exists and passes verification: {:?}",
                target_path
            );
            return Ok(());
        }

        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= config.max_retries {
            if attempt > 0 {
                warn!(
                    "Retry attempt {}/{} for: {}",
                    attempt, config.max_retries, url
                );
            }

            match Self::download_attempt(url, target_path, &config).await {
                Ok(()) => {
                    info!("Successfully downloaded: {} -> {:?}", url, target_path);
                    return Ok(());
                }
                Err(e) => {
                    error!("Download attempt {} failed for {}: {}", attempt + 1, url, e);
                    last_error = Some(e);
                    attempt += 1;

                    if target_path.exists() {
                        debug!("Cleaning up partially downloaded file: {:?}", target_path);
                        if let Err(cleanup_err) = fs::remove_file(target_path).await {
                            warn!(
                                "Failed to clean up partial file {:?}: {}",
                                target_path, cleanup_err
                            );
                        }
                    }

                    if Self::is_cancelled(&config) {
                        debug!("Download for {} was cancelled, not retrying", url);
                        break;
                    }
                }
            }
        }

        let final_error = last_error
            .unwrap_or_else(|| AppError::Download("Unknown download error".to_string()));

        error!(
            "Download failed after {} attempts for {}: {}",
            config.max_retries + 1,
            url,
            final_error
        );

        Err(final_error)
    }

    /// Single download attempt
    async fn download_attempt(
        url: &str,
        target_path: &Path,
        config: &DownloadConfig,
    ) -> Result<()> {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Download(format!(
                    "Failed to create parent directory for {:?}: {}",
                    target_path, e
                ))
            })?;
        }

        let response = HTTP_CLIENT.get(url).send().await.map_err(|e| {
            let error_msg = format!("HTTP request failed for {}: {}", url, e);
            error!("{}", error_msg);
            AppError::Download(error_msg)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_msg = format!(
                "Download failed: {} returned status {} ({})",
                url,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            );
            error!("{}", error_msg);
            return Err(AppError::Download(error_msg));
        }

        let content_length = response.content_length();
        Self::download_streaming(response, target_path, config, content_length).await
    }

    /// Download using streaming
    async fn download_streaming(
        response: Response,
        target_path: &Path,
        config: &DownloadConfig,
        content_length: Option<u64>,
    ) -> Result<()> {
        debug!("Creating file for streaming download: {:?}", target_path);
        let mut file = fs::File::create(target_path).await.map_err(|e| {
            let error_msg = format!("Failed to create file {:?}: {}", target_path, e);
            error!("{}", error_msg);
            AppError::Download(error_msg)
        })?;

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut chunk_count = 0u64;

        debug!(
            "Starting streaming download (content_length: {:?})",
            content_length
        );

        loop {
            if Self::is_cancelled(config) {
                return Err(AppError::Download("Download was cancelled".to_string()));
            }

            let next_chunk = match config.inactivity_timeout {
                Some(timeout) => tokio::time::timeout(timeout, stream.next())
                    .await
                    .map_err(|_| {
                        AppError::Download(format!(
                            "No data received for {}s, download abandoned",
                            timeout.as_secs()
                        ))
                    })?,
                None => stream.next().await,
            };

            let chunk_result = match next_chunk {
                Some(chunk_result) => chunk_result,
                None => break,
            };

            let chunk = chunk_result.map_err(|e| {
                let error_msg = format!("Stream error during download: {}", e);
                error!("{}", error_msg);
                AppError::Download(error_msg)
            })?;

            file.write_all(&chunk).await.map_err(|e| {
                let error_msg = format!("Write error for {:?}: {}", target_path, e);
                error!("{}", error_msg);
                AppError::Download(error_msg)
            })?;

            downloaded += chunk.len() as u64;
            chunk_count += 1;

            if chunk_count % 1000 == 0 {
                debug!("Downloaded {} bytes in {} chunks", downloaded, chunk_count);
            }

            if let Some(callback) = &config.progress_callback {
                callback(downloaded, content_length);
            }
        }

        debug!(
            "Completed streaming download: {} bytes in {} chunks",
            downloaded, chunk_count
        );

        // Make sure everything hit the disk before verification runs
        file.sync_all().await.map_err(|e| {
            AppError::Download(format!("Failed to sync file {:?}: {}", target_path, e))
        })?;
        drop(file);

        Self::verify_downloaded_file(target_path, config).await
    }

    /// Check if existing file passes all verifications
    async fn verify_existing_file(target_path: &Path, config: &DownloadConfig) -> Result<bool> {
        if !target_path.exists() {
            return Ok(false);
        }

        debug!("Verifying existing file: {:?}", target_path);

        if Self::is_archive(target_path) && !Self::is_zip_file_complete(target_path).await {
            debug!(
                "Existing archive failed ZIP integrity check (corrupt): {:?}",
                target_path
            );
            return Ok(false);
        }

        if let Some(expected_sha256) = &config.expected_sha256 {
            let calculated_hash = hash_utils::calculate_sha256_from_file(target_path).await?;
            if !calculated_hash.eq_ignore_ascii_case(expected_sha256) {
                debug!(
                    "SHA256 mismatch for existing file {:?}: expected {}, got {}",
                    target_path, expected_sha256, calculated_hash
                );
                return Ok(false);
            }
        }

        debug!("Existing file passed all verifications: {:?}", target_path);
        Ok(true)
    }

    /// Verify downloaded file after writing
    async fn verify_downloaded_file(target_path: &Path, config: &DownloadConfig) -> Result<()> {
        debug!("Verifying downloaded file: {:?}", target_path);

        if let Some(expected_sha256) = &config.expected_sha256 {
            let calculated_hash = hash_utils::calculate_sha256_from_file(target_path).await?;
            if !calculated_hash.eq_ignore_ascii_case(expected_sha256) {
                let error_msg = format!(
                    "SHA256 mismatch after download for {:?}: expected {}, got {}",
                    target_path, expected_sha256, calculated_hash
                );
                error!("{}", error_msg);
                return Err(AppError::Download(error_msg));
            }
        }

        if Self::is_archive(target_path) && !Self::is_zip_file_complete(target_path).await {
            let error_msg = format!(
                "Downloaded archive failed ZIP integrity check (incomplete/corrupt): {:?}",
                target_path
            );
            error!("{}", error_msg);
            return Err(AppError::Download(error_msg));
        }

        debug!("Downloaded file passed all verifications: {:?}", target_path);
        Ok(())
    }

    fn is_cancelled(config: &DownloadConfig) -> bool {
        config
            .cancel_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn is_archive(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("zip") | Some("jar")
        )
    }

    /// ZIP file integrity check - detects incomplete/corrupt archives.
    /// Checks both the ZIP header and the End of Central Directory record.
    pub async fn is_zip_file_complete(file_path: &Path) -> bool {
        use std::io::SeekFrom;
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let mut file = match fs::File::open(file_path).await {
            Ok(f) => f,
            Err(_) => {
                debug!("Failed to open file for ZIP check: {:?}", file_path);
                return false;
            }
        };

        // 1. Check ZIP header (PK signature)
        let mut header = [0u8; 4];
        if file.read_exact(&mut header).await.is_err() {
            debug!("Failed to read ZIP header: {:?}", file_path);
            return false;
        }

        if header[0] != 0x50 || header[1] != 0x4B {
            debug!("Invalid ZIP header detected: {:?}", file_path);
            return false;
        }

        // 2. Check End of Central Directory Record (EOCD)
        let file_size = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(_) => {
                debug!("Failed to get file size for ZIP check: {:?}", file_path);
                return false;
            }
        };

        if file_size < 22 {
            debug!("File too small to be valid ZIP: {:?}", file_path);
            return false;
        }

        // EOCD must sit within the last 65557 bytes (max comment size + EOCD size)
        let search_size = std::cmp::min(65557, file_size as usize);
        let start_pos = file_size - search_size as u64;

        if file.seek(SeekFrom::Start(start_pos)).await.is_err() {
            debug!("Failed to seek in file for EOCD check: {:?}", file_path);
            return false;
        }

        let mut buffer = vec![0u8; search_size];
        if file.read_exact(&mut buffer).await.is_err() {
            debug!("Failed to read end of file for EOCD check: {:?}", file_path);
            return false;
        }

        for i in (0..buffer.len().saturating_sub(3)).rev() {
            if buffer[i] == 0x50
                && buffer[i + 1] == 0x4B
                && buffer[i + 2] == 0x05
                && buffer[i + 3] == 0x06
            {
                debug!("ZIP integrity check passed: {:?}", file_path);
                return true;
            }
        }

        debug!(
            "EOCD signature not found - ZIP file incomplete: {:?}",
            file_path
        );
        false
    }
}
