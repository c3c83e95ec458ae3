use crate::error::{AppError, Result};
use crate::state::config_state::LauncherConfig;
use crate::state::event_state::InstallationHandle;
use crate::utils::hash_utils;
use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

pub mod browser_assisted;
pub mod direct_stream;
pub mod managed;

pub use browser_assisted::BrowserAssistedFetch;
pub use direct_stream::DirectStreamFetch;
pub use managed::ManagedDownloadFetch;

/// Callback receiving (received bytes, total bytes if known) as an archive
/// fetch makes progress.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// One archive to fetch. The display name only feeds the temp file name.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub source_url: String,
    pub display_name: String,
    /// Seconds without stream activity before the fetch is abandoned.
    pub timeout_secs: u64,
    /// SHA256 the catalog reports for the archive, verified after fetch.
    pub expected_sha256: Option<String>,
}

/// Compares the fetched archive against the catalog's SHA256. A mismatch
/// is a fetch failure; the caller owns the partial-file cleanup.
pub(crate) async fn verify_archive_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = hash_utils::calculate_sha256_from_file(path)
        .await
        .map_err(|e| AppError::FetchError(format!("Failed to hash {:?}: {}", path, e)))?;

    if actual.eq_ignore_ascii_case(expected) {
        debug!("Checksum verified for {:?}", path);
        Ok(())
    } else {
        Err(AppError::FetchError(format!(
            "Checksum mismatch for {:?}: expected {}, got {}",
            path, expected, actual
        )))
    }
}

/// A way of turning a source reference into a local archive file.
///
/// Implementations write to a fresh temp path and return it. They own
/// their partial output: on failure nothing is left behind, and the
/// returned error is the root cause, never a cleanup error.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        app: &tauri::AppHandle,
        request: &FetchRequest,
        handle: &InstallationHandle,
        on_progress: ProgressCallback,
    ) -> Result<PathBuf>;
}

/// Picks the fetch strategy for a source URL.
///
/// Hosts listed in the config need an interactive browser surface
/// (cookie walls, confirmation pages). Share hosts whose links can be
/// rewritten to a direct download are streamed directly. Everything else
/// goes through the managed download path, which retries flaky hosts.
pub fn select_strategy(source_url: &str, config: &LauncherConfig) -> Box<dyn FetchStrategy> {
    let host = match Url::parse(source_url) {
        Ok(url) => url.host_str().map(|h| h.to_ascii_lowercase()),
        Err(e) => {
            warn!(
                "Source URL '{}' did not parse ({}), defaulting to direct stream",
                source_url, e
            );
            None
        }
    };

    let strategy: Box<dyn FetchStrategy> = match host {
        Some(ref host)
            if config
                .browser_assisted_hosts
                .iter()
                .any(|needle| host_matches(host, needle)) =>
        {
            Box::new(BrowserAssistedFetch)
        }
        Some(ref host) if direct_stream::is_share_host(host) => Box::new(DirectStreamFetch),
        Some(_) => Box::new(ManagedDownloadFetch),
        None => Box::new(DirectStreamFetch),
    };

    debug!(
        "Selected fetch strategy '{}' for {}",
        strategy.name(),
        source_url
    );
    strategy
}

fn host_matches(host: &str, needle: &str) -> bool {
    let needle = needle.to_ascii_lowercase();
    host == needle || host.ends_with(&format!(".{}", needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_browser_hosts(hosts: &[&str]) -> LauncherConfig {
        LauncherConfig {
            browser_assisted_hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ..LauncherConfig::default()
        }
    }

    #[test]
    fn share_hosts_stream_directly() {
        let config = LauncherConfig::default();
        let strategy = select_strategy(
            "https://drive.google.com/file/d/abc123/view?usp=sharing",
            &config,
        );
        assert_eq!(strategy.name(), "direct_stream");
    }

    #[test]
    fn configured_hosts_get_the_browser_surface() {
        let config = config_with_browser_hosts(&["mediafire.com"]);

        let strategy = select_strategy("https://www.mediafire.com/file/xyz/mod.zip", &config);
        assert_eq!(strategy.name(), "browser_assisted");

        // Exact match works too
        let strategy = select_strategy("https://mediafire.com/file/xyz/mod.zip", &config);
        assert_eq!(strategy.name(), "browser_assisted");
    }

    #[test]
    fn plain_hosts_use_the_managed_download_path() {
        let config = LauncherConfig::default();
        let strategy = select_strategy("https://cdn.example.com/mods/demo.zip", &config);
        assert_eq!(strategy.name(), "managed");
    }

    #[test]
    fn browser_host_matching_is_suffix_safe() {
        let config = config_with_browser_hosts(&["mediafire.com"]);

        // A host merely containing the needle must not match
        let strategy = select_strategy("https://notmediafire.com/file.zip", &config);
        assert_eq!(strategy.name(), "managed");
    }
}
