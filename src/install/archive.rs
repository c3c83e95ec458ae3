use crate::error::{AppError, Result};
use async_zip::tokio::read::seek::ZipFileReader;
use log::{debug, info, warn};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::BufReader;
use tokio_util::compat::FuturesAsyncReadCompatExt;

/// Extracts every entry of a zip archive into the target directory.
///
/// Entry paths are sanitized component by component, so hostile archives
/// cannot write outside the target directory. Existing files are
/// overwritten, which makes re-installing over a previous install work.
/// Returns the number of files written.
pub async fn install_archive(archive_path: &Path, target_dir: &Path) -> Result<u64> {
    info!("Extracting {:?} -> {:?}", archive_path, target_dir);

    fs::create_dir_all(target_dir).await.map_err(|e| {
        AppError::ExtractError(format!(
            "Failed to create target directory {:?}: {}",
            target_dir, e
        ))
    })?;

    let file = fs::File::open(archive_path).await.map_err(AppError::Io)?;
    let mut buf_reader = BufReader::new(file);
    let mut zip = ZipFileReader::with_tokio(&mut buf_reader)
        .await
        .map_err(|e| {
            AppError::ExtractError(format!("Failed to read archive {:?}: {}", archive_path, e))
        })?;

    let num_entries = zip.file().entries().len();
    debug!("Archive {:?} has {} entries", archive_path, num_entries);

    let mut files_written: u64 = 0;

    for index in 0..num_entries {
        let entry_name;
        let is_dir;
        {
            let entry = match zip.file().entries().get(index) {
                Some(e) => e,
                None => continue,
            };
            entry_name = match entry.filename().as_str() {
                Ok(name) => name.to_string(),
                Err(_) => {
                    warn!("Skipping archive entry {} with a non UTF-8 name", index);
                    continue;
                }
            };
            is_dir = entry.dir().unwrap_or_else(|_| entry_name.ends_with('/'));
        }

        let relative_path = sanitize_entry_path(&entry_name);
        if relative_path.as_os_str().is_empty() {
            warn!(
                "Skipping archive entry '{}' with an empty sanitized path",
                entry_name
            );
            continue;
        }
        let dest_path = target_dir.join(&relative_path);

        if is_dir {
            fs::create_dir_all(&dest_path).await.map_err(|e| {
                AppError::ExtractError(format!(
                    "Failed to create directory {:?}: {}",
                    dest_path, e
                ))
            })?;
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::ExtractError(format!(
                    "Failed to create parent directory {:?}: {}",
                    parent, e
                ))
            })?;
        }

        let entry_reader = zip.reader_without_entry(index).await.map_err(|e| {
            AppError::ExtractError(format!(
                "Failed to read archive entry '{}': {}",
                entry_name, e
            ))
        })?;
        let mut entry_reader = entry_reader.compat();

        let mut writer = fs::File::create(&dest_path).await.map_err(|e| {
            AppError::ExtractError(format!(
                "Failed to create file {:?}: {}",
                dest_path, e
            ))
        })?;

        tokio::io::copy(&mut entry_reader, &mut writer)
            .await
            .map_err(|e| {
                AppError::ExtractError(format!("Failed to write {:?}: {}", dest_path, e))
            })?;

        files_written += 1;
    }

    info!(
        "Extracted {} files from {:?} into {:?}",
        files_written, archive_path, target_dir
    );
    Ok(files_written)
}

/// Removes a consumed archive. The install already succeeded by the time
/// this runs, so failures are logged and swallowed.
pub async fn remove_archive(archive_path: &Path) {
    match fs::remove_file(archive_path).await {
        Ok(()) => debug!("Removed archive {:?}", archive_path),
        Err(e) => warn!("Failed to remove archive {:?}: {}", archive_path, e),
    }
}

/// Keeps the normal components of an entry path, sanitized one by one.
/// Parent, root and prefix components are dropped entirely.
fn sanitize_entry_path(entry_name: &str) -> PathBuf {
    PathBuf::from(entry_name)
        .components()
        .filter_map(|comp| match comp {
            Component::Normal(os_str) => {
                let sanitized = sanitize_filename::sanitize(os_str.to_string_lossy().as_ref());
                if sanitized.is_empty() {
                    None
                } else {
                    Some(sanitized)
                }
            }
            _ => None,
        })
        .collect::<PathBuf>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_zip::tokio::write::ZipFileWriter;
    use async_zip::{Compression, ZipEntryBuilder};

    async fn write_fixture_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut file = fs::File::create(path).await.unwrap();
        let mut writer = ZipFileWriter::with_tokio(&mut file);
        for (name, data) in entries {
            let builder = ZipEntryBuilder::new((*name).to_string().into(), Compression::Deflate);
            writer.write_entry_whole(builder, data).await.unwrap();
        }
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn extracts_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        write_fixture_zip(
            &archive,
            &[
                ("readme.txt", b"hello".as_slice()),
                ("data/voices/intro.ogg", b"oggdata".as_slice()),
            ],
        )
        .await;

        let target = dir.path().join("install");
        let written = install_archive(&archive, &target).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(fs::read(target.join("readme.txt")).await.unwrap(), b"hello");
        assert_eq!(
            fs::read(target.join("data/voices/intro.ogg")).await.unwrap(),
            b"oggdata"
        );
    }

    #[tokio::test]
    async fn overwrites_files_from_a_previous_install() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("install");

        let first = dir.path().join("v1.zip");
        write_fixture_zip(&first, &[("patch.txt", b"old".as_slice())]).await;
        install_archive(&first, &target).await.unwrap();

        let second = dir.path().join("v2.zip");
        write_fixture_zip(&second, &[("patch.txt", b"new".as_slice())]).await;
        install_archive(&second, &target).await.unwrap();

        assert_eq!(fs::read(target.join("patch.txt")).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn hostile_paths_stay_inside_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_fixture_zip(&archive, &[("../escape.txt", b"gotcha".as_slice())]).await;

        let target = dir.path().join("deep").join("install");
        install_archive(&archive, &target).await.unwrap();

        assert!(!dir.path().join("deep").join("escape.txt").exists());
        assert!(target.join("escape.txt").exists());
    }

    #[tokio::test]
    async fn garbage_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_zip = dir.path().join("broken.zip");
        fs::write(&not_a_zip, b"this is not a zip file").await.unwrap();

        let result = install_archive(&not_a_zip, &dir.path().join("out")).await;
        assert!(matches!(result, Err(AppError::ExtractError(_))));
    }

    #[test]
    fn parent_components_are_dropped() {
        assert_eq!(
            sanitize_entry_path("../../evil.txt"),
            PathBuf::from("evil.txt")
        );
        assert_eq!(
            sanitize_entry_path("mods/audio/bank.dat"),
            PathBuf::from("mods/audio/bank.dat")
        );
        assert!(sanitize_entry_path("..").as_os_str().is_empty());
    }
}
