pub mod config_state;
pub mod event_state;
pub mod install_state;
pub mod intent_state;
pub mod post_init;
pub mod preferences_state;
pub mod quick_launch_state;
pub mod state_manager;

pub use state_manager::State;
