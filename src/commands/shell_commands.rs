use crate::error::{AppError, CommandError};
use log::{debug, info, warn};
use std::time::Duration;
use tauri::{command, AppHandle, Manager, WebviewUrl, WebviewWindowBuilder};
use tauri_plugin_opener::OpenerExt;
use tokio::fs;
use url::Url;
use uuid::Uuid;

type Result<T> = std::result::Result<T, CommandError>;

/// Opens a URL in the system browser. Only http(s) URLs are allowed so
/// renderer content cannot trigger arbitrary scheme handlers.
#[command]
pub async fn open_external_url(app: AppHandle, url: String) -> Result<()> {
    let parsed = Url::parse(&url)
        .map_err(|e| CommandError::from(AppError::InvalidUrl(format!("{}: {}", url, e))))?;

    match parsed.scheme() {
        "http" | "https" => {
            info!("Opening external URL: {}", url);
            app.opener().open_url(url, None::<&str>).map_err(|e| {
                CommandError::from(AppError::Other(format!("Failed to open URL: {}", e)))
            })?;
            Ok(())
        }
        scheme => Err(CommandError::from(AppError::InvalidUrl(format!(
            "Refusing to open non-http(s) URL (scheme '{}')",
            scheme
        )))),
    }
}

/// Shows a pre-rendered payment document in its own window and resolves
/// once the user closes it.
#[command]
pub async fn open_payment_surface(app: AppHandle, html: String) -> Result<()> {
    let label = format!("payment-{}", Uuid::new_v4().as_simple());
    let document_path = std::env::temp_dir().join(format!("{}.html", label));

    fs::write(&document_path, html)
        .await
        .map_err(AppError::Io)?;

    let document_url = Url::from_file_path(&document_path).map_err(|_| {
        CommandError::from(AppError::Other(format!(
            "Failed to build a file URL for {:?}",
            document_path
        )))
    })?;

    let built = WebviewWindowBuilder::new(&app, &label, WebviewUrl::External(document_url))
        .title("Payment")
        .inner_size(520.0, 760.0)
        .center()
        .always_on_top(true)
        .build();

    if let Err(e) = built {
        let _ = fs::remove_file(&document_path).await;
        return Err(CommandError::from(AppError::TauriError(e)));
    }

    debug!("Payment surface '{}' open, waiting for close", label);
    while app.get_webview_window(&label).is_some() {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    info!("Payment surface '{}' closed", label);

    if let Err(e) = fs::remove_file(&document_path).await {
        warn!(
            "Failed to remove payment document {:?}: {}",
            document_path, e
        );
    }

    Ok(())
}
