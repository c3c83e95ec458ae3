use crate::config::{ProjectDirsExt, LAUNCHER_DIRECTORY};
use crate::error::{AppError, Result};
use crate::state::config_state::ConfigManager;
use crate::state::event_state::EventState;
use crate::state::install_state::InstallStateTracker;
use crate::state::intent_state::IntentQueue;
use crate::state::post_init::PostInitializationHandler;
use crate::state::preferences_state::PreferenceStore;
use crate::state::quick_launch_state::QuickLaunchManager;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

// Global state that will be initialized once
static LAUNCHER_STATE: OnceCell<Arc<State>> = OnceCell::const_new();

pub fn default_preferences_path() -> PathBuf {
    LAUNCHER_DIRECTORY.root_dir().join("preferences.json")
}

pub struct State {
    pub config_manager: ConfigManager,
    pub preference_store: Arc<PreferenceStore>,
    pub install_tracker: InstallStateTracker,
    pub quick_launch_manager: QuickLaunchManager,
    pub event_state: EventState,
    pub intent_queue: IntentQueue,
}

impl State {
    // Initialize the global state
    pub async fn init(app: Arc<tauri::AppHandle>) -> Result<()> {
        let state_arc = LAUNCHER_STATE
            .get_or_try_init(|| async {
                log::info!("State::init - Starting primary initialization of managers (Phase 1 - Lightweight Instantiation)...");
                let config_manager = ConfigManager::new()?;
                let preference_store =
                    Arc::new(PreferenceStore::new(default_preferences_path())?);
                let install_tracker = InstallStateTracker::new(preference_store.clone());
                let quick_launch_manager = QuickLaunchManager::new(preference_store.clone());
                let event_state = EventState::new(Some(app.clone()));
                let intent_queue = IntentQueue::new();

                log::info!("State::init - Primary initialization of managers complete (Phase 1).");
                Ok::<Arc<State>, AppError>(Arc::new(Self {
                    config_manager,
                    preference_store,
                    install_tracker,
                    quick_launch_manager,
                    event_state,
                    intent_queue,
                }))
            })
            .await?;

        log::info!("State::init - Global state Arc created. Running post-initialization handlers (Phase 2)...");

        state_arc.config_manager.on_state_ready(app.clone()).await?;
        log::info!("State::init - ConfigManager post-initialization complete.");

        state_arc
            .preference_store
            .on_state_ready(app.clone())
            .await?;
        log::info!("State::init - PreferenceStore post-initialization complete.");

        state_arc
            .quick_launch_manager
            .on_state_ready(app.clone())
            .await?;
        state_arc.intent_queue.on_state_ready(app.clone()).await?;

        let loaded_config = state_arc.config_manager.get_config().await;
        log::info!(
            "Launcher Config - Experimental mode: {}, auto update check: {}",
            loaded_config.is_experimental,
            loaded_config.auto_check_updates
        );

        log::info!(
            "State::init - Full initialization, including all post-init handlers, complete."
        );

        Ok(())
    }

    // Get the current state instance
    pub async fn get() -> Result<Arc<Self>> {
        if !LAUNCHER_STATE.initialized() {
            log::error!("Attempted to get state before initialization. Waiting...");
            let mut wait_count = 0;
            while !LAUNCHER_STATE.initialized() {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                wait_count += 1;
                if wait_count % 10 == 0 {
                    // Log every second
                    log::warn!("Still waiting for state initialization in State::get() after {} attempts...", wait_count);
                }
            }
            log::info!(
                "State has been initialized after {} attempts. Proceeding in State::get().",
                wait_count
            );
        }

        Ok(Arc::clone(
            LAUNCHER_STATE.get().expect("State is not initialized!"),
        ))
    }

    // Check if state is initialized
    pub fn initialized() -> bool {
        LAUNCHER_STATE.initialized()
    }
}
