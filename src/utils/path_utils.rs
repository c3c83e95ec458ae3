use chrono::Utc;
use std::path::PathBuf;

/// Turns a mod display name into a safe file stem: whitespace collapses to
/// underscores, anything the filesystem would reject is stripped.
pub fn sanitize_file_stem(display_name: &str) -> String {
    let underscored = display_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let sanitized = sanitize_filename::sanitize(underscored);

    if sanitized.is_empty() {
        "archive".to_string()
    } else {
        sanitized
    }
}

/// Temp location a fetched archive is written to before extraction,
/// e.g. `/tmp/Demo_Mod-1724579305123.zip`. The timestamp keeps repeated
/// installs of the same mod from clobbering each other.
pub fn temp_archive_path(display_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{}-{}.zip",
        sanitize_file_stem(display_name),
        Utc::now().timestamp_millis()
    ))
}
