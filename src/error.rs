use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Tauri error: {0}")]
    TauriError(#[from] tauri::Error),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Extract error: {0}")]
    ExtractError(String),

    #[error("Install path selection was cancelled")]
    PathResolutionCancelled,

    #[error("No executable found in {0:?}")]
    NoExecutableFound(PathBuf),

    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    #[error("An installation for '{0}' is already in progress")]
    InstallInProgress(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Other error: {0}")]
    Other(String),
}

#[derive(Serialize, Debug)]
pub struct CommandError {
    pub message: String,
    pub kind: String,
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        CommandError {
            message: error.to_string(),
            kind: format!("{:?}", error),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
