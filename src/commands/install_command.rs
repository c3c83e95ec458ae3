use crate::error::{AppError, CommandError};
use crate::install::launcher;
use crate::install::pipeline::{self, InstallRequest, InstallResult};
use crate::state::state_manager::State;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;
use tauri::AppHandle;
use tauri_plugin_dialog::DialogExt;

type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Opens a file picker scoped to executables and returns the directory
/// containing the selected file. `None` means the user cancelled.
#[tauri::command]
pub async fn select_install_directory(
    app: AppHandle,
    mod_title: Option<String>,
) -> Result<Option<String>> {
    Ok(pick_executable_directory(app, mod_title).await?)
}

async fn pick_executable_directory(
    app: AppHandle,
    mod_title: Option<String>,
) -> crate::error::Result<Option<String>> {
    let title = match mod_title.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("Select the {} executable", name),
        _ => "Select the game executable".to_string(),
    };

    debug!("Opening file dialog for install directory selection");
    // Spawn the blocking dialog call onto a blocking thread pool
    let dialog_result = tokio::task::spawn_blocking(move || {
        app.dialog()
            .file()
            .add_filter("Executables", &["exe"])
            .set_title(&title)
            .blocking_pick_file()
    })
    .await
    .map_err(AppError::Task)?;

    let Some(file_path) = dialog_result else {
        debug!("Install directory selection cancelled");
        return Ok(None);
    };

    let path = file_path.into_path().map_err(|e| {
        AppError::Other(format!("Failed to convert selected file path: {}", e))
    })?;

    let directory = path.parent().ok_or_else(|| {
        AppError::Other(format!("Selected file {:?} has no parent directory", path))
    })?;

    info!("Install directory selected: {:?}", directory);
    Ok(Some(directory.to_string_lossy().to_string()))
}

/// Returns the stored install path for the slug, prompting the user once
/// when none is stored yet. Cancelling the prompt resolves to `None`;
/// callers abort the install attempt without touching any state.
#[tauri::command]
pub async fn resolve_install_path(
    app: AppHandle,
    slug: String,
    mod_title: Option<String>,
) -> Result<Option<String>> {
    match resolve_or_prompt(app, &slug, mod_title).await {
        Ok(directory) => Ok(Some(directory)),
        Err(AppError::PathResolutionCancelled) => {
            info!("Path resolution for '{}' cancelled by the user", slug);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

async fn resolve_or_prompt(
    app: AppHandle,
    slug: &str,
    mod_title: Option<String>,
) -> crate::error::Result<String> {
    let state = State::get().await?;

    if let Some(existing) = state.install_tracker.install_path(slug).await {
        if !existing.is_empty() {
            debug!("Install path for '{}' already resolved: {}", slug, existing);
            return Ok(existing);
        }
    }

    info!("No install path stored for '{}', prompting the user", slug);
    let directory = pick_executable_directory(app, mod_title)
        .await?
        .ok_or(AppError::PathResolutionCancelled)?;

    state
        .install_tracker
        .set_install_path(slug, Path::new(&directory))
        .await?;
    Ok(directory)
}

/// Kicks off the install pipeline. Pipeline failures come back as
/// `{ success: false, error }` rather than a rejected invoke; progress is
/// pushed over the `installation-status` channel.
#[tauri::command]
pub async fn install_mod(app: AppHandle, request: InstallRequest) -> Result<InstallResult> {
    info!(
        "install_mod invoked for '{}' ({})",
        request.slug, request.display_name
    );
    Ok(pipeline::run_install(app, request).await)
}

/// Flags the pending install for the slug as cancelled. Returns whether
/// anything was pending.
#[tauri::command]
pub async fn cancel_install(slug: String) -> Result<bool> {
    let state = State::get().await?;
    Ok(state.event_state.cancel_installation(&slug))
}

/// Launches the installed game from its install directory.
#[tauri::command]
pub async fn launch_game(install_path: String) -> Result<LaunchResult> {
    let state = State::get().await?;
    let config = state.config_manager.get_config().await;

    match launcher::launch_game(Path::new(&install_path), config.launch_wrapper.as_deref()).await
    {
        Ok(pid) => {
            info!("Launched game from {} (PID {})", install_path, pid);
            Ok(LaunchResult {
                success: true,
                error: None,
            })
        }
        Err(e) => {
            warn!("Launch from {} failed: {}", install_path, e);
            Ok(LaunchResult {
                success: false,
                error: Some(e.to_string()),
            })
        }
    }
}

#[tauri::command]
pub async fn is_mod_installed(slug: String) -> Result<bool> {
    let state = State::get().await?;
    Ok(state.install_tracker.is_installed(&slug).await)
}

/// Clears the installed marker for the slug. The stored install path
/// survives so a re-install does not prompt again.
#[tauri::command]
pub async fn reset_install_state(slug: String) -> Result<()> {
    let state = State::get().await?;
    state.install_tracker.reset(&slug).await?;
    Ok(())
}
