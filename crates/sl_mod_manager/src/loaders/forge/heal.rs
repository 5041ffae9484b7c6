//! Recovering from corrupt cached libraries.
//!
//! The Forge installer refuses to continue when a library it
//! finds on disk has the wrong checksum, and it doesn't always
//! replace the file itself. Deleting that one jar lets the
//! next run download it again.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use sl_core::{err, file_utils, info, ProgressReporter};

static CHECKSUM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(checksum (invalid|mismatch|failed)|invalid checksum|sha-?1 mismatch|hash mismatch|failed to validate)",
    )
        .expect("valid regex")
});
static JAR_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\s'"]+\.jar\b"#).expect("valid regex"));

/// Whether the installer output reports a checksum failure.
///
/// `Checksum validated` lines are normal output and don't count.
#[must_use]
pub fn mentions_checksum(lines: &[String]) -> bool {
    lines.iter().any(|n| CHECKSUM_LINE.is_match(n))
}

/// The jar named in the latest checksum failure.
///
/// The path is either on the same line as the message
/// or on the one right after it.
#[must_use]
pub fn failed_checksum_path(lines: &[String]) -> Option<PathBuf> {
    lines
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, line)| CHECKSUM_LINE.is_match(line))
        .find_map(|(i, line)| {
            std::iter::once(line)
                .chain(lines.get(i + 1))
                .find_map(|n| JAR_PATH.find(n))
                .map(|m| PathBuf::from(m.as_str()))
        })
}

/// Deletes the jar the installer complained about, its
/// `.sha1` sidecar and its folder if that's left empty.
///
/// Only files inside `data_dir` are touched; relative paths
/// are taken as relative to it.
pub async fn delete_failed_jar(lines: &[String], data_dir: &Path, progress: &ProgressReporter) {
    let Some(path) = failed_checksum_path(lines) else {
        info!("Checksum failure without a file name, retrying as-is");
        return;
    };
    let path = if path.is_absolute() {
        path
    } else {
        data_dir.join(path)
    };
    let path = match file_utils::ensure_inside(data_dir, &path) {
        Ok(n) => n,
        Err(error) => {
            err!("Not deleting {path:?}: {error}");
            return;
        }
    };

    info!("Deleting corrupt library {path:?}");
    progress.log(format!("Deleting corrupt library {}", path.to_string_lossy()));
    _ = tokio::fs::remove_file(&path).await;

    let mut sidecar = path.clone().into_os_string();
    sidecar.push(".sha1");
    _ = tokio::fs::remove_file(&sidecar).await;

    if let Some(parent) = path.parent() {
        file_utils::remove_dir_if_empty(parent).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_owned).collect()
    }

    #[test]
    fn path_on_the_same_line() {
        let output = lines(
            "Downloading library from https://maven.minecraftforge.net/a.jar\n\
             Checksum mismatch for /home/u/.minecraft/libraries/org/ow2/asm/asm/9.5/asm-9.5.jar (expected abc)\n\
             There was an error during installation",
        );
        assert!(mentions_checksum(&output));
        assert_eq!(
            failed_checksum_path(&output).unwrap(),
            PathBuf::from("/home/u/.minecraft/libraries/org/ow2/asm/asm/9.5/asm-9.5.jar")
        );
    }

    #[test]
    fn path_on_the_next_line() {
        let output = lines(
            "  File exists: Checksum invalid, deleting file:\n    libraries/com/google/guava/guava/31.1/guava-31.1.jar",
        );
        assert_eq!(
            failed_checksum_path(&output).unwrap(),
            PathBuf::from("libraries/com/google/guava/guava/31.1/guava-31.1.jar")
        );
    }

    #[test]
    fn latest_failure_wins() {
        let output = lines(
            "Checksum mismatch: C:\\mc\\libraries\\a-1.jar\nok\nChecksum mismatch: C:\\mc\\libraries\\b-2.jar",
        );
        assert_eq!(
            failed_checksum_path(&output).unwrap(),
            PathBuf::from("C:\\mc\\libraries\\b-2.jar")
        );
    }

    #[test]
    fn validated_checksums_are_not_failures() {
        let output = lines(
            "  File exists: Checksum validated.\n\
             Processor failed\n\
             java.lang.OutOfMemoryError: Java heap space\n\
             There was an error during installation",
        );
        assert!(!mentions_checksum(&output));
        assert!(failed_checksum_path(&output).is_none());
    }

    #[test]
    fn unrelated_failures_have_no_path() {
        let output = lines("Exception in thread main\n  at net.minecraftforge.installer.Foo(foo.jar)");
        assert!(!mentions_checksum(&output));
        assert!(failed_checksum_path(&output).is_none());
    }

    #[tokio::test]
    async fn deletes_jar_sidecar_and_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("libraries/org/ow2/asm/asm/9.5");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("asm-9.5.jar"), b"bad").unwrap();
        std::fs::write(folder.join("asm-9.5.jar.sha1"), b"abc").unwrap();

        let output = vec![format!(
            "Checksum mismatch for {}",
            folder.join("asm-9.5.jar").to_string_lossy()
        )];
        delete_failed_jar(&output, dir.path(), &ProgressReporter::silent()).await;

        assert!(!folder.exists());
        assert!(dir.path().join("libraries/org/ow2/asm/asm").exists());
    }

    #[tokio::test]
    async fn leaves_files_outside_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        let outside = dir.path().join("keep.jar");
        std::fs::write(&outside, b"keep").unwrap();

        let output = vec![format!("Checksum mismatch for {}", outside.to_string_lossy())];
        delete_failed_jar(&output, &data_dir, &ProgressReporter::silent()).await;

        assert!(outside.exists());
    }
}
