//! Making sure a version is present on disk.
//!
//! A version counts as installed when `versions/<id>/<id>.json`
//! parses and either `versions/<id>/<id>.jar` exists or the
//! version it inherits from is installed. The JSON is always
//! the last file written, so a crash part-way through leaves
//! the version "not installed" and the next call resumes it
//! (files already on disk with a good checksum are kept).

use std::{
    collections::HashMap,
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
};

use sl_core::{
    err, file_utils, info,
    json::VersionDetails,
    mirrors::{ArtifactKind, ArtifactMirrors},
    ErrorKind, HttpTransport, IntoIoError, IntoJsonError, IoError, JsonError, LoaderType, ProgressReporter,
    RequestError,
};
use thiserror::Error;

use crate::catalog::{fabric_profile_url, quilt_profile_url, CatalogError, VersionCatalog};

mod assets;
mod download;
mod libraries;

use download::{url_path, Artifact};
pub use libraries::natives_dir;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Minecraft version {0:?} doesn't exist")]
    UnknownVersion(String),
    #[error(
        "{id} is a {loader} profile that isn't installed yet.\nInstall it first: install-loader --loader {} --mc-version <version>",
        loader.to_str()
    )]
    LoaderProfileMissing { id: String, loader: LoaderType },
    #[error("couldn't download {url}\n{error}\n\nCheck your internet connection, or try again with a VPN.")]
    Download { url: String, error: RequestError },
    #[error("checksum mismatch for {url}\nexpected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },
    #[error("no download source for {0}")]
    NoMirrors(String),
    #[error("couldn't write game files:\n{0}")]
    Disk(#[from] IoError),
    #[error("couldn't read version metadata:\n{0}")]
    Json(#[from] JsonError),
    #[error("couldn't extract natives from {path:?}:\n{error}")]
    Natives { path: PathBuf, error: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl InstallError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::UnknownVersion(_) => ErrorKind::InvalidRequest,
            InstallError::LoaderProfileMissing { .. } => ErrorKind::LoaderNotInstalled,
            InstallError::Download { .. }
            | InstallError::NoMirrors(_)
            | InstallError::Json(_)
            | InstallError::Natives { .. } => ErrorKind::DownloadFailed,
            InstallError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            InstallError::Disk(_) => ErrorKind::DiskWriteError,
            InstallError::Catalog(error) => error.kind(),
        }
    }
}

/// Downloads game versions into `<dataDir>`.
///
/// Layout follows the vanilla launcher:
/// `versions/<id>/`, `libraries/`, `assets/`.
pub struct ArtifactInstaller {
    transport: Arc<dyn HttpTransport>,
    catalog: Arc<VersionCatalog>,
    data_dir: PathBuf,
    mirrors: ArtifactMirrors,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ArtifactInstaller {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        catalog: Arc<VersionCatalog>,
        data_dir: impl Into<PathBuf>,
        mirrors: ArtifactMirrors,
    ) -> Self {
        Self {
            transport,
            catalog,
            data_dir: data_dir.into(),
            mirrors,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    #[must_use]
    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    /// Checks the on-disk state only (no network).
    pub async fn is_installed(&self, id: &str) -> bool {
        let versions_dir = self.versions_dir();
        let mut id = id.to_owned();
        // Bounded walk up the inheritance chain
        for _ in 0..8 {
            let Ok(details) = VersionDetails::load(&versions_dir, &id).await else {
                return false;
            };
            if file_utils::exists(VersionDetails::jar_path(&versions_dir, &id)).await {
                return true;
            }
            match details.inheritsFrom {
                Some(parent) if parent != id => id = parent,
                _ => return false,
            }
        }
        false
    }

    /// Installs `id` unless it's already complete.
    ///
    /// The installed check happens before anything else, so
    /// repeated launches of an installed version touch no network.
    /// Concurrent calls for the same id are serialized; different
    /// ids proceed independently.
    ///
    /// # Errors
    /// See [`InstallError::kind`]: download failures after all
    /// mirrors, checksum mismatches on every mirror, disk errors.
    pub async fn ensure_installed(
        &self,
        id: &str,
        progress: &ProgressReporter,
    ) -> Result<(), InstallError> {
        if self.is_installed(id).await {
            return Ok(());
        }

        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        // Someone else may have finished it while we waited.
        if self.is_installed(id).await {
            return Ok(());
        }

        info!("Installing version {id}");
        self.install(id, progress).await?;
        info!("Finished installing {id}");
        Ok(())
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.to_owned()).or_default().clone()
    }

    /// Boxed because it recurses through `ensure_installed`
    /// for the `inheritsFrom` parent.
    fn install<'a>(
        &'a self,
        id: &'a str,
        progress: &'a ProgressReporter,
    ) -> Pin<Box<dyn Future<Output = Result<(), InstallError>> + Send + 'a>> {
        Box::pin(async move {
            progress.status(format!("Fetching version info for {id}"));
            let (json_text, already_on_disk) = self.fetch_version_json(id).await?;
            let details: VersionDetails =
                serde_json::from_str(&json_text).json(json_text.clone())?;

            if let Some(parent) = details.inheritsFrom.as_deref().filter(|n| *n != id) {
                self.ensure_installed(parent, progress).await?;
            }

            let version_dir = self.versions_dir().join(id);
            tokio::fs::create_dir_all(&version_dir)
                .await
                .path(&version_dir)?;

            if let Some(client) = details.downloads.as_ref().and_then(|n| n.client.as_ref()) {
                progress.status(format!("Downloading {id}.jar"));
                self.fetch_verified(
                    &Artifact {
                        kind: ArtifactKind::Meta,
                        url: &client.url,
                        repo_path: url_path(&client.url),
                        sha1: Some(&client.sha1),
                    },
                    &VersionDetails::jar_path(&self.versions_dir(), id),
                )
                .await?;
            }

            self.download_libraries(id, &details, progress).await?;

            if let Some(index) = &details.assetIndex {
                self.download_assets(index, progress).await?;
            }

            if !already_on_disk {
                let json_path = VersionDetails::json_path(&self.versions_dir(), id);
                file_utils::write_atomic(&json_path, json_text.as_bytes()).await?;
            }
            Ok(())
        })
    }

    /// Finds the version JSON: on disk, in the Mojang manifest,
    /// or (for Fabric/Quilt profiles) from the loader's metadata server.
    async fn fetch_version_json(&self, id: &str) -> Result<(String, bool), InstallError> {
        let local = VersionDetails::json_path(&self.versions_dir(), id);
        if let Ok(text) = tokio::fs::read_to_string(&local).await {
            if serde_json::from_str::<VersionDetails>(&text).is_ok() {
                return Ok((text, true));
            }
            err!("Ignoring unreadable {local:?}");
        }

        if let Some(rest) = id.strip_prefix("fabric-loader-") {
            return self
                .fetch_loader_profile(id, rest, LoaderType::Fabric)
                .await
                .map(|n| (n, false));
        }
        if let Some(rest) = id.strip_prefix("quilt-loader-") {
            return self
                .fetch_loader_profile(id, rest, LoaderType::Quilt)
                .await
                .map(|n| (n, false));
        }

        let lower = id.to_lowercase();
        if lower.contains("forge") {
            return Err(InstallError::LoaderProfileMissing {
                id: id.to_owned(),
                loader: LoaderType::Forge,
            });
        }
        if lower.contains("optifine") {
            return Err(InstallError::LoaderProfileMissing {
                id: id.to_owned(),
                loader: LoaderType::OptiFine,
            });
        }

        let manifest = self.catalog.manifest().await?;
        let version = manifest
            .find_name(id)
            .ok_or_else(|| InstallError::UnknownVersion(id.to_owned()))?;

        // Kept in memory until everything else is installed.
        let temp = file_utils::temp_sibling(&local);
        self.fetch_verified(
            &Artifact {
                kind: ArtifactKind::Meta,
                url: &version.url,
                repo_path: url_path(&version.url),
                sha1: version.sha1.as_deref(),
            },
            &temp,
        )
        .await?;
        let text = tokio::fs::read_to_string(&temp).await.path(&temp);
        _ = tokio::fs::remove_file(&temp).await;
        Ok((text?, false))
    }

    /// `rest` is `<loader>-<mc>`; both halves may contain dashes,
    /// so every split point is tried until the server knows one.
    async fn fetch_loader_profile(
        &self,
        id: &str,
        rest: &str,
        loader: LoaderType,
    ) -> Result<String, InstallError> {
        let mut last_error = None;
        for (pos, _) in rest.match_indices('-') {
            let (loader_version, mc_version) = (&rest[..pos], &rest[pos + 1..]);
            let url = match loader {
                LoaderType::Quilt => quilt_profile_url(mc_version, loader_version),
                _ => fabric_profile_url(mc_version, loader_version),
            };
            let response = match sl_core::retry(|| self.transport.get(&url)).await {
                Ok(n) => n,
                Err(error) => {
                    last_error = Some(InstallError::Download { url, error });
                    continue;
                }
            };
            match response.error_for_status() {
                Ok(response) => return Ok(response.text()),
                Err(error) => last_error = Some(InstallError::Download { url, error }),
            }
        }
        Err(last_error.unwrap_or_else(|| InstallError::UnknownVersion(id.to_owned())))
    }
}
