use crate::error::CommandError;
use crate::state::quick_launch_state::QuickLaunchEntry;
use crate::state::state_manager::State;
use log::info;
use tauri::command;

type Result<T> = std::result::Result<T, CommandError>;

#[command]
pub async fn get_quick_launch_list() -> Result<Vec<QuickLaunchEntry>> {
    let state = State::get().await?;
    Ok(state.quick_launch_manager.list().await)
}

/// Moves (or inserts) the entry at the front of the quick launch list.
/// Called by the UI after a successful launch so the list tracks recency.
#[command]
pub async fn promote_quick_launch_item(entry: QuickLaunchEntry) -> Result<Vec<QuickLaunchEntry>> {
    info!("Promoting '{}' in quick launch", entry.slug);
    let state = State::get().await?;
    Ok(state.quick_launch_manager.promote(entry).await?)
}
