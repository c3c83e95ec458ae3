// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

mod commands;
mod config;
mod error;
mod install;
mod logging;
mod state;
mod utils;
use crate::state::intent_state::parse_protocol_url;
use log::{error, info};
use std::sync::Arc;
use tauri::Manager;
use utils::updater_utils;

use commands::config_commands::{
    check_for_updates, get_app_version, get_launcher_config, set_launcher_config,
};
use commands::install_command::{
    cancel_install, install_mod, is_mod_installed, launch_game, reset_install_state,
    resolve_install_path, select_install_directory,
};
use commands::preference_commands::{delete_preference, get_preference, set_preference};
use commands::protocol_commands::get_pending_protocol_intent;
use commands::quick_launch_commands::{get_quick_launch_list, promote_quick_launch_item};
use commands::shell_commands::{open_external_url, open_payment_surface};

fn submit_protocol_intent(intent: state::intent_state::ProtocolIntent) {
    tauri::async_runtime::spawn(async move {
        match state::state_manager::State::get().await {
            Ok(state) => state.intent_queue.submit(intent).await,
            Err(e) => error!("Cannot forward protocol intent: {}", e),
        }
    });
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::setup_logging().await {
        eprintln!("ERROR: Logging could not be initialized: {}", e);
    }

    info!("Starting PrestiJ Studio...");

    tauri::Builder::default()
        .plugin(tauri_plugin_updater::Builder::new().build())
        .plugin(tauri_plugin_single_instance::init(|app, argv, _cwd| {
            info!(
                "SingleInstance plugin: Second instance triggered with args: {:?}",
                argv
            );
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.show();
                let _ = window.unminimize();
                let _ = window.set_focus();
            }
            // On Windows and Linux a deep link launch lands here, as an
            // argument of the second instance.
            for arg in &argv {
                if let Some(intent) = parse_protocol_url(arg) {
                    submit_protocol_intent(intent);
                }
            }
        }))
        .plugin(tauri_plugin_deep_link::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let app_handle = app.handle().clone();

            #[cfg(desktop)]
            {
                use tauri_plugin_deep_link::DeepLinkExt;
                app.deep_link().on_open_url(|event| {
                    for url in event.urls() {
                        info!("Deep link received: {}", url);
                        if let Some(intent) = parse_protocol_url(url.as_str()) {
                            submit_protocol_intent(intent);
                        }
                    }
                });
            }

            // Task for State Init and the startup update check
            let state_init_app_handle = app_handle.clone();
            tauri::async_runtime::spawn(async move {
                info!("Initiating state initialization...");
                if let Err(e) =
                    state::state_manager::State::init(Arc::new(state_init_app_handle.clone()))
                        .await
                {
                    error!("CRITICAL: Failed to initialize state: {}. Commands will not work correctly.", e);
                    return;
                }
                info!("State initialization finished successfully.");

                match state::state_manager::State::get().await {
                    Ok(state) => {
                        let config = state.config_manager.get_config().await;
                        if config.auto_check_updates {
                            info!("Initiating application update check...");
                            updater_utils::check_for_updates(state_init_app_handle.clone()).await;
                            info!("Update check process has finished.");
                        } else {
                            info!("Auto-check for updates is disabled in settings. Skipping update check.");
                        }
                    }
                    Err(e) => {
                        error!("Failed to get global state for update check: {}.", e);
                    }
                }
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            select_install_directory,
            resolve_install_path,
            install_mod,
            cancel_install,
            launch_game,
            is_mod_installed,
            reset_install_state,
            get_quick_launch_list,
            promote_quick_launch_item,
            get_preference,
            set_preference,
            delete_preference,
            get_pending_protocol_intent,
            open_external_url,
            open_payment_surface,
            get_launcher_config,
            set_launcher_config,
            get_app_version,
            check_for_updates
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|_app_handle, event| {
            if let tauri::RunEvent::ExitRequested { .. } = event {
                info!("Exit requested.");
            }
        });
}
