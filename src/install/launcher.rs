use crate::error::{AppError, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Scans the top level of an install directory for the game executable.
///
/// Packages ship the binary next to their data directories, so only the
/// top level is searched. Candidates are sorted by file name, which keeps
/// repeated scans deterministic when a package ships more than one `.exe`.
pub async fn find_game_executable(install_dir: &Path) -> Result<PathBuf> {
    let mut read_dir = fs::read_dir(install_dir).await.map_err(AppError::Io)?;
    let mut candidates: Vec<PathBuf> = Vec::new();

    while let Some(dir_entry) = read_dir.next_entry().await.map_err(AppError::Io)? {
        let file_type = dir_entry.file_type().await.map_err(AppError::Io)?;
        if !file_type.is_file() {
            continue;
        }
        let path = dir_entry.path();
        let is_executable = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("exe"))
            .unwrap_or(false);
        if is_executable {
            candidates.push(path);
        }
    }

    candidates.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    debug!(
        "Found {} executable candidate(s) in {:?}",
        candidates.len(),
        install_dir
    );

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NoExecutableFound(install_dir.to_path_buf()))
}

/// Spawns the game executable detached from the launcher, so closing the
/// launcher never takes the game down with it. Returns the PID.
pub async fn launch_game(install_dir: &Path, wrapper: Option<&str>) -> Result<u32> {
    if !install_dir.is_dir() {
        return Err(AppError::LaunchFailed(format!(
            "Install directory {:?} does not exist",
            install_dir
        )));
    }

    let executable = find_game_executable(install_dir).await?;
    info!("Launching {:?}", executable);

    let mut command = build_launch_command(&executable, wrapper);
    command.current_dir(install_dir);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x00000008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let mut tokio_command = tokio::process::Command::from(command);
    let child = tokio_command.spawn().map_err(|e| {
        AppError::LaunchFailed(format!("Failed to spawn {:?}: {}", executable, e))
    })?;

    let pid = child
        .id()
        .ok_or_else(|| AppError::LaunchFailed("Could not get PID after spawn".to_string()))?;
    info!("Game process started with PID {}", pid);
    Ok(pid)
}

/// An optional wrapper ("gamemoderun", "wine", ...) becomes the program
/// and the executable is appended as its final argument.
fn build_launch_command(executable: &Path, wrapper: Option<&str>) -> std::process::Command {
    match wrapper.map(str::trim).filter(|w| !w.is_empty()) {
        Some(wrapper) => {
            let mut parts = wrapper.split_whitespace();
            // split_whitespace on a non-empty string always yields a first part
            let program = parts.next().unwrap_or(wrapper);
            let mut command = std::process::Command::new(program);
            command.args(parts);
            command.arg(executable);
            command
        }
        None => std::process::Command::new(executable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn picks_the_first_executable_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Zeta.exe"), b"mz").await.unwrap();
        fs::write(dir.path().join("Alpha.exe"), b"mz").await.unwrap();
        fs::write(dir.path().join("readme.txt"), b"hi").await.unwrap();

        let exe = find_game_executable(dir.path()).await.unwrap();
        assert_eq!(exe.file_name().unwrap(), "Alpha.exe");
    }

    #[tokio::test]
    async fn ignores_directories_named_like_executables() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Fake.exe")).await.unwrap();
        fs::write(dir.path().join("Game.exe"), b"mz").await.unwrap();

        let exe = find_game_executable(dir.path()).await.unwrap();
        assert_eq!(exe.file_name().unwrap(), "Game.exe");
    }

    #[tokio::test]
    async fn missing_executable_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), b"hi").await.unwrap();

        let result = find_game_executable(dir.path()).await;
        assert!(matches!(result, Err(AppError::NoExecutableFound(_))));
    }

    #[test]
    fn wrapper_prefixes_the_command_line() {
        let exe = Path::new("/games/demo/Game.exe");

        let plain = build_launch_command(exe, None);
        assert_eq!(plain.get_program(), exe.as_os_str());

        let wrapped = build_launch_command(exe, Some("wine --no-sync"));
        assert_eq!(wrapped.get_program(), "wine");
        let args: Vec<_> = wrapped.get_args().collect();
        assert_eq!(
            args,
            vec![
                std::ffi::OsStr::new("--no-sync"),
                exe.as_os_str()
            ]
        );
    }

    #[test]
    fn blank_wrapper_is_ignored() {
        let exe = Path::new("/games/demo/Game.exe");
        let command = build_launch_command(exe, Some("   "));
        assert_eq!(command.get_program(), exe.as_os_str());
    }
}
