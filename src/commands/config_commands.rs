use crate::error::{AppError, CommandError};
use crate::state::{config_state::LauncherConfig, State};
use crate::utils::updater_utils;
use tauri::command;
use tauri::AppHandle;

type Result<T> = std::result::Result<T, CommandError>;

#[command]
pub async fn get_launcher_config() -> Result<LauncherConfig> {
    let state = State::get().await?;
    let config = state.config_manager.get_config().await;
    Ok(config)
}

#[command]
pub async fn set_launcher_config(config: LauncherConfig) -> Result<LauncherConfig> {
    let state = State::get().await?;

    if config.fetch_timeout_secs == 0 {
        return Err(CommandError::from(AppError::Other(
            "Fetch timeout must be at least 1 second".to_string(),
        )));
    }

    // Set the entire configuration
    state.config_manager.set_config(config.clone()).await?;

    // Return the updated config
    Ok(config)
}

#[command]
pub fn get_app_version(app_handle: AppHandle) -> Result<String> {
    Ok(app_handle.package_info().version.to_string())
}

/// Manual update check; progress is pushed over the `updater_status`
/// channel rather than returned.
#[command]
pub async fn check_for_updates(app_handle: AppHandle) -> Result<()> {
    updater_utils::check_for_updates(app_handle).await;
    Ok(())
}
