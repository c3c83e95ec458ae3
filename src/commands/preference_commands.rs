use crate::error::CommandError;
use crate::state::state_manager::State;
use log::debug;
use serde_json::Value;
use tauri::command;

type Result<T> = std::result::Result<T, CommandError>;

#[command]
pub async fn get_preference(key: String) -> Result<Option<Value>> {
    let state = State::get().await?;
    Ok(state.preference_store.get(&key).await)
}

#[command]
pub async fn set_preference(key: String, value: Value) -> Result<()> {
    let state = State::get().await?;
    debug!("Setting preference '{}'", key);
    state.preference_store.set(&key, value).await?;
    Ok(())
}

#[command]
pub async fn delete_preference(key: String) -> Result<()> {
    let state = State::get().await?;
    debug!("Deleting preference '{}'", key);
    state.preference_store.delete(&key).await?;
    Ok(())
}
