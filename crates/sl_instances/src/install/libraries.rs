use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use owo_colors::OwoColorize;
use sl_core::{
    do_jobs, err, file_utils, info,
    json::{version::LibraryDownloadArtifact, Library, VersionDetails},
    mirrors::ArtifactKind,
    pt, IntoIoError, ProgressReporter,
};

use super::{download::Artifact, ArtifactInstaller, InstallError};

impl ArtifactInstaller {
    pub(super) async fn download_libraries(
        &self,
        id: &str,
        details: &VersionDetails,
        progress: &ProgressReporter,
    ) -> Result<(), InstallError> {
        info!("Downloading libraries");
        let natives_dir = natives_dir(&self.versions_dir(), id);
        let libraries: Vec<&Library> = details.libraries.iter().filter(|n| n.is_allowed()).collect();
        let total = libraries.len();
        let done = AtomicUsize::new(0);
        let (natives_dir, done) = (&natives_dir, &done);

        _ = do_jobs(libraries.iter().map(|library| async move {
            self.download_library(library, natives_dir).await?;
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            progress.progress(n, total, "Downloading libraries");
            Ok::<(), InstallError>(())
        }))
        .await?;
        Ok(())
    }

    async fn download_library(
        &self,
        library: &Library,
        natives_dir: &Path,
    ) -> Result<(), InstallError> {
        let name = library.name.as_deref().unwrap_or_default();

        if let Some(artifact) = library.get_artifact() {
            self.fetch_library_artifact(name, &artifact).await?;
        }

        if let Some(native) = library.get_native_artifact() {
            pt!("  Natives: {}", name.bright_black());
            let jar = self.fetch_library_artifact(name, &native).await?;
            if let Some(jar) = jar {
                let exclude = library
                    .extract
                    .as_ref()
                    .map(|n| n.exclude.clone())
                    .unwrap_or_default();
                extract_natives(jar, natives_dir.to_owned(), exclude).await?;
            }
        }
        Ok(())
    }

    /// Returns where the jar ended up, or `None` if
    /// it has no url and isn't on disk (installer-generated files).
    async fn fetch_library_artifact(
        &self,
        name: &str,
        artifact: &LibraryDownloadArtifact,
    ) -> Result<Option<PathBuf>, InstallError> {
        let repo_path = artifact.get_path();
        let dest = self.libraries_dir().join(&repo_path);

        if artifact.url.is_empty() {
            if !file_utils::exists(&dest).await {
                err!("Library {name} has no download url, skipping");
                return Ok(None);
            }
            return Ok(Some(dest));
        }

        pt!("{} {name}", "Library".underline());
        self.fetch_verified(
            &Artifact {
                kind: ArtifactKind::Library,
                url: &artifact.url,
                repo_path: &repo_path,
                sha1: artifact.sha1.as_deref(),
            },
            &dest,
        )
        .await?;
        Ok(Some(dest))
    }
}

/// `versions/<id>/natives`
#[must_use]
pub fn natives_dir(versions_dir: &Path, id: &str) -> PathBuf {
    versions_dir.join(id).join("natives")
}

async fn extract_natives(
    jar: PathBuf,
    dest: PathBuf,
    exclude: Vec<String>,
) -> Result<(), InstallError> {
    let path = jar.clone();
    tokio::task::spawn_blocking(move || extract_natives_blocking(&jar, &dest, &exclude))
        .await
        .map_err(|n| InstallError::Natives {
            path,
            error: n.to_string(),
        })?
}

fn extract_natives_blocking(
    jar: &Path,
    dest: &Path,
    exclude: &[String],
) -> Result<(), InstallError> {
    let natives_err = |error: String| InstallError::Natives {
        path: jar.to_owned(),
        error,
    };

    let file = std::fs::File::open(jar).path(jar)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|n| natives_err(n.to_string()))?;
    std::fs::create_dir_all(dest).path(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|n| natives_err(n.to_string()))?;
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let name_str = name.to_string_lossy().replace('\\', "/");
        if name_str.starts_with("META-INF") || exclude.iter().any(|n| name_str.starts_with(n)) {
            continue;
        }

        let out_path = dest.join(&name);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).path(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).path(parent)?;
        }
        let mut out = std::fs::File::create(&out_path).path(&out_path)?;
        std::io::copy(&mut entry, &mut out).path(&out_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn make_jar(path: &Path, files: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, contents) in files {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn natives_skip_meta_inf_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lwjgl-natives.jar");
        make_jar(
            &jar,
            &[
                ("liblwjgl.so", &b"so"[..]),
                ("META-INF/MANIFEST.MF", &b"x"[..]),
                ("debug/skip.txt", &b"x"[..]),
            ],
        );

        let dest = dir.path().join("natives");
        extract_natives(jar, dest.clone(), vec!["debug/".to_owned()])
            .await
            .unwrap();

        assert!(dest.join("liblwjgl.so").exists());
        assert!(!dest.join("META-INF").exists());
        assert!(!dest.join("debug/skip.txt").exists());
    }
}
