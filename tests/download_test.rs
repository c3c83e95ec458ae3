// tests/download_test.rs

use prestij_studio_lib::error::AppError;
use prestij_studio_lib::utils::download_utils::{DownloadConfig, DownloadUtils};
use prestij_studio_lib::utils::hash_utils;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn setup_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serves exactly one canned HTTP response on a local port, then goes away.
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

#[tokio::test]
async fn non_2xx_response_fails_and_leaves_no_file() {
    setup_logging();
    let url = spawn_one_shot_server(
        b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            .to_vec(),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("payload.bin");

    let result =
        DownloadUtils::download_file(&url, &target, DownloadConfig::new().with_retries(0)).await;

    assert!(matches!(result, Err(AppError::Download(_))));
    assert!(!target.exists());
}

#[tokio::test]
async fn truncated_stream_fails_and_cleans_the_partial_file() {
    setup_logging();
    // Announces 100 bytes but closes the socket after 5
    let mut response =
        b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\nconnection: close\r\n\r\n".to_vec();
    response.extend_from_slice(b"hello");
    let url = spawn_one_shot_server(response).await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("payload.bin");

    let result =
        DownloadUtils::download_file(&url, &target, DownloadConfig::new().with_retries(0)).await;

    assert!(matches!(result, Err(AppError::Download(_))));
    assert!(!target.exists());
}

#[tokio::test]
async fn checksum_mismatch_after_download_fails_and_cleans_up() {
    setup_logging();
    let mut response =
        b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\nconnection: close\r\n\r\n".to_vec();
    response.extend_from_slice(b"hello");
    let url = spawn_one_shot_server(response).await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("payload.bin");

    let config = DownloadConfig::new()
        .with_retries(0)
        .with_sha256("0".repeat(64));
    let result = DownloadUtils::download_file(&url, &target, config).await;

    assert!(matches!(result, Err(AppError::Download(_))));
    assert!(!target.exists());
}

#[tokio::test]
async fn existing_verified_file_short_circuits_the_download() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("payload.bin");
    tokio::fs::write(&target, b"cached payload").await.unwrap();
    let digest = hash_utils::calculate_sha256_from_file(&target).await.unwrap();

    // The URL points nowhere; it must never be contacted when the
    // existing file passes verification.
    let config = DownloadConfig::new().with_sha256(digest);
    DownloadUtils::download_file("http://127.0.0.1:1/unreachable", &target, config)
        .await
        .unwrap();

    assert_eq!(
        tokio::fs::read(&target).await.unwrap(),
        b"cached payload"
    );
}
