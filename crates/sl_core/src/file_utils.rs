use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::{error::IoError, IntoIoError};

/// Returns the path to the launcher data folder
/// (the `<dataDir>` that holds `versions/`, `libraries/`,
/// `assets/`, `mods/` and `settings.json`).
///
/// This is `$SL_DIR` if set, otherwise a `16launcher`
/// folder inside the standard Minecraft directory:
/// - `%APPDATA%/.minecraft` on Windows
/// - `~/Library/Application Support/minecraft` on macOS
/// - `~/.minecraft` everywhere else
///
/// # Errors
/// - if the home/data dir is not found
/// - if the launcher directory could not be created (permissions issue)
pub fn get_launcher_dir() -> Result<PathBuf, IoError> {
    let launcher_directory = if let Ok(n) = std::env::var("SL_DIR") {
        canonicalize_s(&n)
    } else {
        get_minecraft_dir()?.join("16launcher")
    };

    std::fs::create_dir_all(&launcher_directory).path(&launcher_directory)?;
    Ok(launcher_directory)
}

fn get_minecraft_dir() -> Result<PathBuf, IoError> {
    if cfg!(target_os = "windows") {
        dirs::data_dir()
            .map(|n| n.join(".minecraft"))
            .ok_or(IoError::LauncherDirNotFound)
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|n| n.join("minecraft"))
            .ok_or(IoError::LauncherDirNotFound)
    } else {
        dirs::home_dir()
            .map(|n| n.join(".minecraft"))
            .ok_or(IoError::LauncherDirNotFound)
    }
}

pub(crate) const NETWORK_ERROR_MSG: &str = r"
- Check your internet connection
- Try enabling a VPN (some download servers are blocked in some regions)
- If it keeps failing, download the file manually

";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Download Error (code {code}){NETWORK_ERROR_MSG}Url: {url}")]
    DownloadError { code: u16, url: String },
    #[error("Network Request Error{NETWORK_ERROR_MSG}{0}")]
    ReqwestError(#[from] reqwest::Error),
}

impl RequestError {
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            RequestError::DownloadError { code, url } => {
                format!("Download Error (code {code}), Url: {url}")
            }
            RequestError::ReqwestError(error) => format!("Network Request Error: {error}"),
        }
    }
}

/// # Errors
/// If the HTTP response status is not a success code.
pub fn check_for_success(response: &reqwest::Response) -> Result<(), RequestError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(RequestError::DownloadError {
            code: response.status().as_u16(),
            url: response.url().to_string(),
        })
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A sibling path to `path` that no other writer will pick.
///
/// Downloads and rewrites go here first and are then
/// renamed over the real file, so readers never
/// observe a half-written file.
#[must_use]
pub fn temp_sibling(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("download");
    path.with_file_name(format!("{name}.{}-{n}.part", std::process::id()))
}

/// Writes `contents` to `path` through a temporary file and a rename.
///
/// # Errors
/// If the parent directory can't be created or the file can't be written.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.path(parent)?;
    }
    let temp = temp_sibling(path);
    if let Err(err) = tokio::fs::write(&temp, contents).await {
        _ = tokio::fs::remove_file(&temp).await;
        return Err(err.path(&temp));
    }
    rename_into_place(&temp, path).await
}

/// Renames a finished temporary file over `dest`,
/// cleaning up the temporary file on failure.
pub async fn rename_into_place(temp: &Path, dest: &Path) -> Result<(), IoError> {
    if let Err(err) = tokio::fs::rename(temp, dest).await {
        _ = tokio::fs::remove_file(temp).await;
        return Err(err.path(dest));
    }
    Ok(())
}

/// Lowercase hex SHA-1 of some bytes.
#[must_use]
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Lowercase hex SHA-1 of a file on disk.
pub async fn sha1_file(path: &Path) -> Result<String, IoError> {
    let bytes = tokio::fs::read(path).await.path(path)?;
    Ok(sha1_hex(&bytes))
}

/// Removes `dir` only if it has no entries left.
/// Returns whether it was removed.
pub async fn remove_dir_if_empty(dir: &Path) -> bool {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return false;
    };
    if let Ok(Some(_)) = entries.next_entry().await {
        return false;
    }
    tokio::fs::remove_dir(dir).await.is_ok()
}

/// Checks that `child` stays inside `parent` after
/// resolving `..` and symlinks, so paths taken from
/// untrusted text can't be used to touch anything else.
///
/// # Errors
/// [`IoError::DirEscapeAttack`] if it escapes.
pub fn ensure_inside(parent: &Path, child: &Path) -> Result<PathBuf, IoError> {
    let parent = canonicalize_s(parent);
    let child = canonicalize_s(child);
    if child.starts_with(&parent) {
        Ok(child)
    } else {
        Err(IoError::DirEscapeAttack)
    }
}

pub fn canonicalize_s(p: impl AsRef<Path>) -> PathBuf {
    let p = p.as_ref();
    #[allow(unused_mut)]
    if let Ok(mut n) = std::fs::canonicalize(p) {
        #[cfg(target_os = "windows")]
        {
            let s = n.to_string_lossy();
            if let Some(s) = s.strip_prefix("\\\\?\\") {
                n = PathBuf::from(s);
            }
        }
        n
    } else {
        p.to_owned()
    }
}

pub async fn exists(p: impl AsRef<Path>) -> bool {
    tokio::fs::try_exists(p).await.is_ok_and(|n| n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_of_known_input() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn temp_siblings_never_collide() {
        let p = Path::new("/tmp/some/file.jar");
        let a = temp_sibling(p);
        let b = temp_sibling(p);
        assert_ne!(a, b);
        assert_eq!(a.parent(), p.parent());
        assert!(a.to_string_lossy().ends_with(".part"));
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_part_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.json");
        write_atomic(&target, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");

        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn empty_dirs_are_removed_but_full_ones_stay() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::create_dir_all(&full).unwrap();
        std::fs::write(full.join("a.jar"), b"x").unwrap();

        assert!(remove_dir_if_empty(&empty).await);
        assert!(!remove_dir_if_empty(&full).await);
        assert!(full.exists());
    }

    #[test]
    fn paths_outside_parent_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let inside = dir.path().join("libraries");
        std::fs::create_dir_all(&inside).unwrap();
        assert!(ensure_inside(dir.path(), &inside).is_ok());
        assert!(matches!(
            ensure_inside(&inside, dir.path()),
            Err(IoError::DirEscapeAttack)
        ));
    }
}
