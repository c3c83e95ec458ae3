// Learn more about Tauri commands at https://tauri.app/develop/calling-rust/
pub mod commands;
pub mod config;
pub mod error;
pub mod install;
pub mod logging;
pub mod state;
pub mod utils;
