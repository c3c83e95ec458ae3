use crate::error::CommandError;
use crate::state::intent_state::ProtocolIntent;
use crate::state::state_manager::State;
use tauri::command;

type Result<T> = std::result::Result<T, CommandError>;

/// Hands the UI the deep link intent that arrived before it was ready to
/// listen, if any. Each queued intent is handed out exactly once.
#[command]
pub async fn get_pending_protocol_intent() -> Result<Option<ProtocolIntent>> {
    let state = State::get().await?;
    Ok(state.intent_queue.take_pending().await)
}
