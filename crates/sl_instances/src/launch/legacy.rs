//! Compatibility patch for versions before 1.7.5.
//!
//! Old clients lack the classes modern skin/auth servers
//! expect. The patch jar ships them; its `.class` entries
//! go into the version jar, replacing any the jar already has.
//! The patched jar is built next to the original and renamed
//! over it, so a failed patch leaves the old jar intact.

use std::{
    collections::BTreeMap,
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
};

use sl_core::{
    file_utils, info, retry, ErrorKind, HttpTransport, IntoIoError, IoError, RequestError,
    LEGACY_PATCH_URL,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("version jar not found: {0:?}")]
    JarMissing(PathBuf),
    #[error("couldn't download the legacy patch:\n{0}")]
    Download(#[from] RequestError),
    #[error("broken archive: {0}")]
    Zip(String),
    #[error(transparent)]
    Io(#[from] IoError),
}

impl PatchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PatchFailed
    }
}

/// Downloads the legacy patch and merges it into `jar`.
/// Returns how many classes were written.
pub async fn apply_legacy_patch(
    transport: &dyn HttpTransport,
    jar: &Path,
) -> Result<usize, PatchError> {
    if !file_utils::exists(jar).await {
        return Err(PatchError::JarMissing(jar.to_owned()));
    }

    info!("Downloading legacy patch");
    let patch = retry(|| async {
        transport
            .get(LEGACY_PATCH_URL)
            .await
            .and_then(|n| n.error_for_status())
    })
    .await?
    .body;

    let temp = file_utils::temp_sibling(jar);
    let (source, dest) = (jar.to_owned(), temp.clone());
    let merged = tokio::task::spawn_blocking(move || merge_classes(&source, &dest, patch))
        .await
        .map_err(|n| PatchError::Zip(n.to_string()))
        .and_then(|n| n);
    let written = match merged {
        Ok(n) => n,
        Err(error) => {
            _ = tokio::fs::remove_file(&temp).await;
            return Err(error);
        }
    };
    file_utils::rename_into_place(&temp, jar).await?;

    info!("Legacy patch applied ({written} classes)");
    Ok(written)
}

/// Writes `jar` plus every `.class` from `patch` into `dest`.
/// Patch classes replace the jar's own copies.
fn merge_classes(jar: &Path, dest: &Path, patch: Vec<u8>) -> Result<usize, PatchError> {
    let zip_err = |n: zip::result::ZipError| PatchError::Zip(n.to_string());

    let mut patch = zip::ZipArchive::new(Cursor::new(patch)).map_err(zip_err)?;
    let mut classes = BTreeMap::new();
    for i in 0..patch.len() {
        let mut entry = patch.by_index(i).map_err(zip_err)?;
        if !entry.is_file() || !entry.name().ends_with(".class") {
            continue;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).path(jar)?;
        classes.insert(entry.name().to_owned(), contents);
    }

    let mut original =
        zip::ZipArchive::new(std::fs::File::open(jar).path(jar)?).map_err(zip_err)?;
    let mut writer = zip::ZipWriter::new(std::fs::File::create(dest).path(dest)?);

    for i in 0..original.len() {
        let entry = original.by_index_raw(i).map_err(zip_err)?;
        if classes.contains_key(entry.name()) {
            continue;
        }
        writer.raw_copy_file(entry).map_err(zip_err)?;
    }
    for (name, contents) in &classes {
        writer
            .start_file(name.as_str(), zip::write::SimpleFileOptions::default())
            .map_err(zip_err)?;
        writer.write_all(contents).path(dest)?;
    }
    writer.finish().map_err(zip_err)?;
    Ok(classes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::ScriptedTransport;

    fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn patch_classes_replace_the_jars_own() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("1.5.2.jar");
        std::fs::write(&jar, zip_bytes(&[("a.class", "old"), ("x.txt", "x")])).unwrap();

        let transport = ScriptedTransport::new();
        transport.ok(
            LEGACY_PATCH_URL,
            zip_bytes(&[("a.class", "new"), ("b.class", "b"), ("README", "r")]),
        );

        let written = apply_legacy_patch(&transport, &jar).await.unwrap();
        assert_eq!(written, 2);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&jar).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(names, ["a.class", "b.class", "x.txt"]);
        let mut patched = String::new();
        archive
            .by_name("a.class")
            .unwrap()
            .read_to_string(&mut patched)
            .unwrap();
        assert_eq!(patched, "new");
        let mut kept = String::new();
        archive.by_name("x.txt").unwrap().read_to_string(&mut kept).unwrap();
        assert_eq!(kept, "x");
    }

    #[tokio::test]
    async fn broken_patch_leaves_the_jar_alone() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("1.5.2.jar");
        let original = zip_bytes(&[("a.class", "old")]);
        std::fs::write(&jar, &original).unwrap();

        let transport = ScriptedTransport::new();
        transport.ok(LEGACY_PATCH_URL, b"not a zip".to_vec());

        let error = apply_legacy_patch(&transport, &jar).await.unwrap_err();
        assert!(matches!(error, PatchError::Zip(_)));
        assert_eq!(std::fs::read(&jar).unwrap(), original);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn failures_are_patch_failed() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();

        let missing = apply_legacy_patch(&transport, &dir.path().join("none.jar"))
            .await
            .unwrap_err();
        assert!(matches!(missing, PatchError::JarMissing(_)));

        let jar = dir.path().join("1.5.2.jar");
        std::fs::write(&jar, zip_bytes(&[("a.class", "old")])).unwrap();
        let offline = apply_legacy_patch(&transport, &jar).await.unwrap_err();
        assert_eq!(offline.kind(), ErrorKind::PatchFailed);
        assert!(matches!(offline, PatchError::Download(_)));
    }
}
