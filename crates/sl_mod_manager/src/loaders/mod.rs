//! Installing mod loaders on top of a game version.
//!
//! - Forge: downloads the official installer (with mirror
//!   fallback) and runs it.
//! - Fabric / Quilt: installs the loader's launch profile
//!   through the regular [`ArtifactInstaller`].
//! - OptiFine: runs a third-party patcher script that turns
//!   OptiFine into a regular mod jar under `mods/<mc>/`.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use sl_core::{
    err, info, mirrors::ForgeMirrors, ErrorKind, HttpTransport, IoError, LoaderType,
    ProgressReporter, RequestError,
};
use sl_instances::{ArtifactInstaller, CatalogError, InstallError, VersionCatalog};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod fabric;
mod forge;
mod optifine;
pub mod subprocess;

pub use forge::failed_checksum_path;
pub use optifine::parse_done_code;

const MANUAL_HINT: &str =
    "Check your internet connection, try again with a VPN, or install it manually.";

#[derive(Debug, Error)]
pub enum LoaderInstallError {
    #[error("invalid install request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("couldn't download the Forge installer for {build} from any mirror.\nLast error: {last_error}\n\n{MANUAL_HINT}")]
    AllMirrorsFailed { build: String, last_error: String },
    #[error("couldn't download {url}:\n{error}\n\n{MANUAL_HINT}")]
    Download { url: String, error: RequestError },
    #[error("Java wasn't found or doesn't work ({0}).\nInstall Java 17+ and add it to PATH.")]
    JavaNotFound(String),
    #[error("Python 3 wasn't found. Install it and add it to PATH.")]
    PythonNotFound,
    #[error("the Forge installer failed ({reason}):\n{output}\n\nTry again, or run the installer manually.")]
    InstallerExitNonZero { reason: String, output: String },
    #[error("couldn't install {loader}:\n{message}")]
    Fabric { loader: LoaderType, message: String },
    #[error("couldn't install OptiFine:\n{0}")]
    OptiFine(String),
    #[error("couldn't run {program}: {error}")]
    Process { program: String, error: String },
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("installation cancelled")]
    Cancelled,
}

impl LoaderInstallError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoaderInstallError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            LoaderInstallError::Catalog(error) => error.kind(),
            LoaderInstallError::Install(error) => error.kind(),
            LoaderInstallError::AllMirrorsFailed { .. } => ErrorKind::AllMirrorsFailed,
            LoaderInstallError::Download { .. } => ErrorKind::DownloadFailed,
            LoaderInstallError::JavaNotFound(_) => ErrorKind::JavaNotFound,
            LoaderInstallError::PythonNotFound => ErrorKind::PythonNotFound,
            LoaderInstallError::InstallerExitNonZero { .. }
            | LoaderInstallError::Process { .. } => ErrorKind::InstallerExitNonZero,
            LoaderInstallError::Fabric { .. } => ErrorKind::FabricInstallError,
            LoaderInstallError::OptiFine(_) => ErrorKind::OptiFineInstallError,
            LoaderInstallError::Io(_) => ErrorKind::DiskWriteError,
            LoaderInstallError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Installs mod loaders into `<dataDir>`.
pub struct ModLoaderInstaller {
    transport: Arc<dyn HttpTransport>,
    catalog: Arc<VersionCatalog>,
    installer: Arc<ArtifactInstaller>,
    forge_mirrors: ForgeMirrors,
    data_dir: PathBuf,
    java: PathBuf,
}

impl ModLoaderInstaller {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        catalog: Arc<VersionCatalog>,
        installer: Arc<ArtifactInstaller>,
        forge_mirrors: ForgeMirrors,
    ) -> Self {
        let data_dir = installer.data_dir().to_owned();
        Self {
            transport,
            catalog,
            installer,
            forge_mirrors,
            data_dir,
            java: PathBuf::from("java"),
        }
    }

    /// The Java that runs the Forge installer
    /// (`java` from PATH by default).
    #[must_use]
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }

    /// Installs `loader` for `mc_version` and returns a
    /// human-readable summary.
    ///
    /// `loader_version`: a specific Forge build, Fabric/Quilt
    /// loader version or OptiFine release. The latest one is
    /// used when `None`.
    ///
    /// `cancel` is checked between mirror and patcher attempts.
    pub async fn install(
        &self,
        loader: LoaderType,
        mc_version: &str,
        loader_version: Option<&str>,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<String, LoaderInstallError> {
        validate(loader, mc_version)?;
        progress.started();

        let loader_version = loader_version.map(str::trim).filter(|n| !n.is_empty());
        let result = match loader {
            LoaderType::Forge => {
                self.install_forge(mc_version, loader_version, progress, cancel)
                    .await
            }
            LoaderType::Fabric | LoaderType::Quilt => {
                self.install_fabric_like(loader, mc_version, loader_version, progress)
                    .await
            }
            LoaderType::OptiFine => {
                self.install_optifine(mc_version, loader_version, progress, cancel)
                    .await
            }
            LoaderType::Vanilla => Err(LoaderInstallError::InvalidRequest(
                "vanilla isn't a mod loader".to_owned(),
            )),
        };

        match result {
            Ok(message) => {
                info!("{message}");
                progress.finish_ok(message.clone());
                Ok(message)
            }
            Err(error) => {
                err!("Couldn't install {loader}: {error}");
                progress.finish_err(error.to_string());
                Err(error)
            }
        }
    }

    /// [`ModLoaderInstaller::install`] on its own task.
    pub fn spawn(
        self: Arc<Self>,
        loader: LoaderType,
        mc_version: String,
        loader_version: Option<String>,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<String, LoaderInstallError>>, LoaderInstallError> {
        validate(loader, &mc_version)?;
        Ok(tokio::spawn(async move {
            self.install(
                loader,
                &mc_version,
                loader_version.as_deref(),
                &progress,
                &cancel,
            )
            .await
        }))
    }

    /// Installs the plain game version, logging (not
    /// returning) failures: loader installers fetch what
    /// they need themselves.
    async fn install_base_best_effort(&self, mc_version: &str, progress: &ProgressReporter) {
        if self.installer.is_installed(mc_version).await {
            return;
        }
        progress.status(format!("Installing Minecraft {mc_version}"));
        if let Err(error) = self.installer.ensure_installed(mc_version, progress).await {
            err!("Couldn't install Minecraft {mc_version}: {error}");
            progress.log(format!("Couldn't install Minecraft {mc_version}: {error}"));
        }
    }
}

fn validate(loader: LoaderType, mc_version: &str) -> Result<(), LoaderInstallError> {
    if loader == LoaderType::Vanilla {
        return Err(LoaderInstallError::InvalidRequest(
            "vanilla isn't a mod loader".to_owned(),
        ));
    }
    if mc_version.trim().is_empty() {
        return Err(LoaderInstallError::InvalidRequest(
            "the Minecraft version is empty".to_owned(),
        ));
    }
    Ok(())
}

fn shorten(line: &str, max: usize) -> String {
    line.chars().take(max).collect()
}

/// `java -version` must work before any installer runs.
async fn check_java(java: &Path) -> Result<(), LoaderInstallError> {
    let mut command = tokio::process::Command::new(java);
    command.arg("-version").kill_on_drop(true);
    sl_core::no_window!(command);

    let output = tokio::time::timeout(Duration::from_secs(10), command.output())
        .await
        .map_err(|_| LoaderInstallError::JavaNotFound("java -version timed out".to_owned()))?
        .map_err(|n| LoaderInstallError::JavaNotFound(n.to_string()))?;
    if !output.status.success() {
        return Err(LoaderInstallError::JavaNotFound(format!(
            "java -version exited with {}",
            output.status
        )));
    }
    // Java prints its version on stderr.
    let version = String::from_utf8_lossy(&output.stderr);
    info!("Java: {}", version.lines().next().unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::{mirrors::ArtifactMirrors, EventLog, ScriptedTransport};

    fn loader_installer(
        transport: &Arc<ScriptedTransport>,
        dir: &tempfile::TempDir,
    ) -> ModLoaderInstaller {
        let catalog = Arc::new(VersionCatalog::new(transport.clone(), dir.path()));
        let installer = Arc::new(ArtifactInstaller::new(
            transport.clone(),
            catalog.clone(),
            dir.path(),
            ArtifactMirrors::default(),
        ));
        ModLoaderInstaller::new(transport.clone(), catalog, installer, ForgeMirrors::default())
    }

    #[tokio::test]
    async fn vanilla_is_not_a_loader() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let log = EventLog::new();
        let progress = ProgressReporter::new(Arc::new(log.clone()));

        let error = loader_installer(&transport, &dir)
            .install(
                LoaderType::Vanilla,
                "1.20.1",
                None,
                &progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidRequest);
        assert!(log.events().is_empty());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn empty_version_is_rejected_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let error = Arc::new(loader_installer(&transport, &dir))
            .spawn(
                LoaderType::Forge,
                "  ".to_owned(),
                None,
                ProgressReporter::silent(),
                CancellationToken::new(),
            )
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidRequest);
    }
}
