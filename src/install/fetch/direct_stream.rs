use crate::config::HTTP_CLIENT;
use crate::error::{AppError, Result};
use crate::install::fetch::{self, FetchRequest, FetchStrategy, ProgressCallback};
use crate::state::event_state::InstallationHandle;
use crate::utils::path_utils;
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

static DRIVE_FILE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").expect("valid drive file regex"));
static DRIVE_QUERY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]id=([a-zA-Z0-9_-]+)").expect("valid drive query regex"));

/// Hosts whose share links this strategy knows how to rewrite into a
/// direct download.
pub fn is_share_host(host: &str) -> bool {
    host == "drive.google.com" || host.ends_with(".drive.google.com")
}

/// Rewrites share-page links into direct download URLs. Google Drive
/// viewer links carry the file id either in the path (`/file/d/<id>`) or
/// the query (`id=<id>`); both become a `uc?export=download` URL with the
/// scan-confirmation token pre-set. Anything unrecognized passes through.
pub fn unwrap_share_link(source_url: &str) -> String {
    let host = Url::parse(source_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()));

    match host {
        Some(host) if is_share_host(&host) => {
            let file_id = DRIVE_FILE_ID
                .captures(source_url)
                .or_else(|| DRIVE_QUERY_ID.captures(source_url))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str());

            match file_id {
                Some(id) => {
                    let direct = format!(
                        "https://drive.google.com/uc?export=download&id={}&confirm=t",
                        id
                    );
                    debug!("Rewrote share link {} -> {}", source_url, direct);
                    direct
                }
                None => {
                    warn!(
                        "Share link {} has no recognizable file id, using it as-is",
                        source_url
                    );
                    source_url.to_string()
                }
            }
        }
        _ => source_url.to_string(),
    }
}

/// Streams the archive over a plain GET into a temp file, reporting
/// received bytes at every chunk boundary.
pub struct DirectStreamFetch;

#[async_trait]
impl FetchStrategy for DirectStreamFetch {
    fn name(&self) -> &'static str {
        "direct_stream"
    }

    async fn fetch(
        &self,
        _app: &tauri::AppHandle,
        request: &FetchRequest,
        handle: &InstallationHandle,
        on_progress: ProgressCallback,
    ) -> Result<PathBuf> {
        let download_url = unwrap_share_link(&request.source_url);
        let temp_path = path_utils::temp_archive_path(&request.display_name);

        info!(
            "Fetching '{}' from {} -> {:?}",
            request.display_name, download_url, temp_path
        );

        fetch_to_path(&download_url, &temp_path, request, handle, on_progress).await?;
        Ok(temp_path)
    }
}

/// Streams into the temp path and verifies the catalog checksum when one
/// is known. Nothing is left behind on failure.
async fn fetch_to_path(
    download_url: &str,
    temp_path: &Path,
    request: &FetchRequest,
    handle: &InstallationHandle,
    on_progress: ProgressCallback,
) -> Result<()> {
    if let Err(e) = stream_to_file(download_url, temp_path, request, handle, on_progress).await {
        remove_partial(temp_path).await;
        return Err(e);
    }

    if let Some(expected) = &request.expected_sha256 {
        if let Err(e) = fetch::verify_archive_checksum(temp_path, expected).await {
            remove_partial(temp_path).await;
            return Err(e);
        }
    }

    Ok(())
}

async fn stream_to_file(
    download_url: &str,
    temp_path: &Path,
    request: &FetchRequest,
    handle: &InstallationHandle,
    on_progress: ProgressCallback,
) -> Result<()> {
    let response = HTTP_CLIENT
        .get(download_url)
        .send()
        .await
        .map_err(|e| AppError::FetchError(format!("Request to {} failed: {}", download_url, e)))?;

    if !response.status().is_success() {
        return Err(AppError::FetchError(format!(
            "{} returned status {}",
            download_url,
            response.status()
        )));
    }

    let content_length = response.content_length();
    let chunk_timeout = Duration::from_secs(request.timeout_secs);

    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| AppError::FetchError(format!("Failed to create {:?}: {}", temp_path, e)))?;

    let mut stream = response.bytes_stream();
    let mut received = 0u64;

    loop {
        if handle.is_cancelled() {
            return Err(AppError::FetchError(
                "Download was cancelled by the user".to_string(),
            ));
        }

        let next_chunk = tokio::time::timeout(chunk_timeout, stream.next())
            .await
            .map_err(|_| {
                AppError::FetchError(format!(
                    "No data received for {}s, download abandoned",
                    request.timeout_secs
                ))
            })?;

        let chunk = match next_chunk {
            Some(chunk_result) => chunk_result
                .map_err(|e| AppError::FetchError(format!("Stream error: {}", e)))?,
            None => break,
        };

        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::FetchError(format!("Write error: {}", e)))?;

        received += chunk.len() as u64;
        on_progress(received, content_length);
    }

    file.sync_all()
        .await
        .map_err(|e| AppError::FetchError(format!("Failed to sync {:?}: {}", temp_path, e)))?;

    debug!("Streamed {} bytes to {:?}", received, temp_path);
    Ok(())
}

/// Removes a partial download. Failures are logged, never surfaced: the
/// caller's root error must stay intact.
async fn remove_partial(temp_path: &Path) {
    if !temp_path.exists() {
        return;
    }
    match fs::remove_file(temp_path).await {
        Ok(()) => debug!("Removed partial download {:?}", temp_path),
        Err(e) => warn!("Failed to remove partial download {:?}: {}", temp_path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::event_state::EventState;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const HELLO_SHA256: &str =
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    /// Serves exactly one canned HTTP response on a local port.
    async fn spawn_one_shot_server(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn ok_response(body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    fn stub_request(url: &str, expected_sha256: Option<&str>) -> FetchRequest {
        FetchRequest {
            source_url: url.to_string(),
            display_name: "Stub Mod".to_string(),
            timeout_secs: 5,
            expected_sha256: expected_sha256.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn non_2xx_response_fails_without_leftovers() {
        let url = spawn_one_shot_server(
            b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_vec(),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join("stub.zip");
        let events = EventState::new(None);
        let handle = events.begin_installation("stub-mod").unwrap();
        let request = stub_request(&url, None);

        let result =
            fetch_to_path(&url, &temp_path, &request, &handle, Arc::new(|_, _| {})).await;

        assert!(matches!(result, Err(AppError::FetchError(_))));
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn matching_checksum_passes_and_keeps_the_file() {
        let url = spawn_one_shot_server(ok_response(b"hello")).await;
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join("stub.zip");
        let events = EventState::new(None);
        let handle = events.begin_installation("stub-mod").unwrap();
        let request = stub_request(&url, Some(HELLO_SHA256));

        fetch_to_path(&url, &temp_path, &request, &handle, Arc::new(|_, _| {}))
            .await
            .unwrap();

        assert_eq!(fs::read(&temp_path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn checksum_mismatch_fails_and_deletes_the_download() {
        let url = spawn_one_shot_server(ok_response(b"hello")).await;
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join("stub.zip");
        let events = EventState::new(None);
        let handle = events.begin_installation("stub-mod").unwrap();
        let request = stub_request(&url, Some(&"0".repeat(64)));

        let result =
            fetch_to_path(&url, &temp_path, &request, &handle, Arc::new(|_, _| {})).await;

        match result {
            Err(AppError::FetchError(message)) => assert!(message.contains("mismatch")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn cancellation_stops_the_stream_and_cleans_up() {
        let url = spawn_one_shot_server(ok_response(b"hello")).await;
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join("stub.zip");
        let events = EventState::new(None);
        let handle = events.begin_installation("stub-mod").unwrap();
        events.cancel_installation("stub-mod");
        let request = stub_request(&url, None);

        let result =
            fetch_to_path(&url, &temp_path, &request, &handle, Arc::new(|_, _| {})).await;

        match result {
            Err(AppError::FetchError(message)) => assert!(message.contains("cancelled")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!temp_path.exists());
    }

    #[test]
    fn viewer_links_are_rewritten_to_direct_downloads() {
        let direct =
            unwrap_share_link("https://drive.google.com/file/d/1aB_c-9/view?usp=sharing");
        assert_eq!(
            direct,
            "https://drive.google.com/uc?export=download&id=1aB_c-9&confirm=t"
        );
    }

    #[test]
    fn open_id_links_are_rewritten_to_direct_downloads() {
        let direct = unwrap_share_link("https://drive.google.com/open?id=XYZ123");
        assert_eq!(
            direct,
            "https://drive.google.com/uc?export=download&id=XYZ123&confirm=t"
        );
    }

    #[test]
    fn other_hosts_pass_through_untouched() {
        let url = "https://cdn.example.com/mods/demo.zip?id=123";
        assert_eq!(unwrap_share_link(url), url);
    }

    #[test]
    fn unrecognized_share_links_pass_through() {
        let url = "https://drive.google.com/drive/folders/someFolder";
        assert_eq!(unwrap_share_link(url), url);
    }
}
