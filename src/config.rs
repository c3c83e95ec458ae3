use directories::ProjectDirs;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

pub static LAUNCHER_DIRECTORY: Lazy<ProjectDirs> =
    Lazy::new(
        || match ProjectDirs::from("app", "prestij", "PrestiJStudio") {
            Some(proj_dirs) => proj_dirs,
            None => panic!("Failed to get application directory"),
        },
    );

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// HTTP Client with launcher agent
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    let client = reqwest::ClientBuilder::new()
        .user_agent(APP_USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new());
    client
});

// Extension trait for ProjectDirs to add root_dir functionality
pub trait ProjectDirsExt {
    fn root_dir(&self) -> PathBuf;
}

impl ProjectDirsExt for ProjectDirs {
    fn root_dir(&self) -> PathBuf {
        if cfg!(target_os = "windows") {
            match self.data_dir().parent() {
                Some(parent) => parent.to_path_buf(),
                None => self.data_dir().to_path_buf(),
            }
        } else {
            self.data_dir().to_path_buf()
        }
    }
}
