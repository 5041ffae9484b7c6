//! Java runtimes for 16Launcher.
//!
//! Version JSONs name the runtime they want in `javaVersion`
//! (a `component` like `java-runtime-gamma` and a `majorVersion`).
//! [`JavaInstaller`] downloads Mojang's build of that runtime
//! into `<dataDir>/runtime/<component>/`, where the launch
//! command looks for it.
//!
//! # Platform Support
//!
//! Whatever Mojang publishes in its
//! [runtime index](https://launchermeta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json):
//! Windows (x64, x86, arm64), macOS (x64, arm64) and
//! Linux (x64, i386). Elsewhere [`JavaInstaller::ensure`]
//! fails with [`JavaInstallError::UnsupportedPlatform`] and
//! the user has to bring their own Java.
//!
//! An `install.lock` file sits in the folder while a runtime
//! is downloading. A folder that still has one is reinstalled.

use std::{
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use owo_colors::OwoColorize;
use sl_core::{
    ARCH, ErrorKind, HttpTransport, IntoIoError, IoError, JAVA_RUNTIME_LIST_URL, JsonError,
    OS_NAME, ProgressReporter, RequestError, do_jobs_with_limit, err, file_utils,
    impl_3_errs_jri, info, json::version::JavaVersionJson, pt, retry, transport::get_json,
};
use thiserror::Error;

mod json;

pub use json::{JavaFile, JavaFileDownload, JavaFilesJson, JavaListJson};

const LOCK_FILE: &str = "install.lock";

#[cfg(target_os = "macos")]
const LIMIT: usize = 16;
#[cfg(not(target_os = "macos"))]
const LIMIT: usize = 64;

/// File name of the java executable.
pub const JAVA_BIN: &str = if cfg!(windows) { "java.exe" } else { "java" };

const ERR_PREFIX: &str = "while installing Java:\n";

#[derive(Debug, Error)]
pub enum JavaInstallError {
    #[error("{ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error(
        "Java can't be installed automatically on {OS_NAME} ({ARCH}).\nInstall Java {0} yourself and set it as the custom Java path."
    )]
    UnsupportedPlatform(usize),
    #[error("Mojang doesn't publish Java {major} ({component}) for {OS_NAME} ({ARCH})")]
    RuntimeNotListed { component: String, major: usize },
    #[error("{ERR_PREFIX}{file}: checksum mismatch (expected {expected}, got {got})")]
    ChecksumMismatch {
        file: String,
        expected: String,
        got: String,
    },
    #[error("{ERR_PREFIX}no {JAVA_BIN} in {0:?} after installing")]
    NoJavaBinFound(PathBuf),
}

impl_3_errs_jri!(JavaInstallError, Json, Request, Io);

impl JavaInstallError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            JavaInstallError::Request(_) | JavaInstallError::Json(_) => ErrorKind::DownloadFailed,
            JavaInstallError::Io(_) => ErrorKind::DiskWriteError,
            JavaInstallError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            JavaInstallError::UnsupportedPlatform(_)
            | JavaInstallError::RuntimeNotListed { .. }
            | JavaInstallError::NoJavaBinFound(_) => ErrorKind::JavaNotFound,
        }
    }
}

/// Mojang's name for this platform in the runtime index.
#[must_use]
pub fn platform_key() -> Option<&'static str> {
    match (OS_NAME, ARCH) {
        ("linux", "x86_64") => Some("linux"),
        ("linux", "x86") => Some("linux-i386"),
        ("osx", "x86_64") => Some("mac-os"),
        ("osx", "arm64") => Some("mac-os-arm64"),
        ("windows", "x86_64") => Some("windows-x64"),
        ("windows", "x86") => Some("windows-x86"),
        ("windows", "arm64") => Some("windows-arm64"),
        _ => None,
    }
}

/// The component that ships a Java major version,
/// for version JSONs naming one the index doesn't have.
#[must_use]
pub fn component_for_major(major: usize) -> &'static str {
    match major {
        8 => "jre-legacy",
        16 => "java-runtime-alpha",
        17 => "java-runtime-gamma",
        25 => "java-runtime-epsilon",
        _ => "java-runtime-delta",
    }
}

/// The java executable inside an install folder, if there is one.
///
/// macOS builds nest it inside a bundle.
#[must_use]
pub fn java_binary(install_dir: &Path) -> Option<PathBuf> {
    ["bin", "jre.bundle/Contents/Home/bin", "Contents/Home/bin"]
        .iter()
        .map(|n| install_dir.join(n).join(JAVA_BIN))
        .find(|n| n.is_file())
}

/// Downloads Java runtimes into `<dataDir>/runtime`.
pub struct JavaInstaller {
    transport: Arc<dyn HttpTransport>,
    runtime_dir: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JavaInstaller {
    pub fn new(transport: Arc<dyn HttpTransport>, data_dir: &Path) -> Self {
        Self {
            transport,
            runtime_dir: data_dir.join("runtime"),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn install_dir(&self, java: &JavaVersionJson) -> PathBuf {
        self.runtime_dir.join(&java.component)
    }

    /// The java executable of a finished install (no network).
    pub async fn find(&self, java: &JavaVersionJson) -> Option<PathBuf> {
        let install_dir = self.install_dir(java);
        if file_utils::exists(install_dir.join(LOCK_FILE)).await {
            return None;
        }
        java_binary(&install_dir)
    }

    /// Returns the java executable for `java`,
    /// downloading the runtime first if it's missing.
    ///
    /// # Errors
    /// See [`JavaInstallError::kind`].
    pub async fn ensure(
        &self,
        java: &JavaVersionJson,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, JavaInstallError> {
        if let Some(bin) = self.find(java).await {
            return Ok(bin);
        }
        let _guard = self.lock.lock().await;
        if let Some(bin) = self.find(java).await {
            return Ok(bin);
        }

        let major = java.majorVersion;
        let platform = platform_key().ok_or(JavaInstallError::UnsupportedPlatform(major))?;
        info!("Installing Java {major} ({})", java.component);
        progress.status(format!("Installing Java {major}"));

        let list: JavaListJson = get_json(self.transport.as_ref(), JAVA_RUNTIME_LIST_URL).await?;
        let url = list
            .manifest_url(platform, &java.component)
            .or_else(|| list.manifest_url(platform, component_for_major(major)))
            .ok_or_else(|| JavaInstallError::RuntimeNotListed {
                component: java.component.clone(),
                major,
            })?;
        let manifest: JavaFilesJson = get_json(self.transport.as_ref(), url).await?;

        let install_dir = self.install_dir(java);
        tokio::fs::create_dir_all(&install_dir)
            .await
            .path(&install_dir)?;
        let lock_file = install_dir.join(LOCK_FILE);
        tokio::fs::write(&lock_file, "If you see this, Java hasn't finished installing.")
            .await
            .path(&lock_file)?;

        self.install_files(&manifest, &install_dir, progress)
            .await?;

        tokio::fs::remove_file(&lock_file).await.path(&lock_file)?;
        info!("Finished installing Java {major}");
        java_binary(&install_dir).ok_or(JavaInstallError::NoJavaBinFound(install_dir))
    }

    async fn install_files(
        &self,
        manifest: &JavaFilesJson,
        install_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<(), JavaInstallError> {
        let mut files = Vec::new();
        let mut links = Vec::new();
        for (name, file) in &manifest.files {
            let path = join_relative(install_dir, name)?;
            match file {
                JavaFile::Directory => {
                    tokio::fs::create_dir_all(&path).await.path(&path)?;
                }
                JavaFile::File {
                    downloads,
                    executable,
                } => files.push((name.as_str(), path, downloads, *executable)),
                JavaFile::Link { target } => links.push((path, target.as_str())),
            }
        }

        let total = files.len();
        let done = AtomicUsize::new(0);
        do_jobs_with_limit(
            files.into_iter().map(|(name, path, downloads, executable)| {
                let done = &done;
                async move {
                    self.install_file(name, &path, downloads, executable)
                        .await?;
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    pt!("file ({n}/{total}): {name}");
                    progress.progress(n, total, format!("Installing Java: {name}"));
                    Ok::<_, JavaInstallError>(())
                }
            }),
            LIMIT,
        )
        .await?;

        for (path, target) in links {
            make_link(&path, target).await;
        }
        Ok(())
    }

    async fn install_file(
        &self,
        name: &str,
        path: &Path,
        downloads: &JavaFileDownload,
        executable: bool,
    ) -> Result<(), JavaInstallError> {
        // Left over from an interrupted install.
        let already_there = file_utils::exists(path).await
            && file_utils::sha1_file(path).await.is_ok_and(|n| n == downloads.raw.sha1);
        if !already_there {
            let bytes = self.download(downloads).await?;
            let got = file_utils::sha1_hex(&bytes);
            if got != downloads.raw.sha1 {
                return Err(JavaInstallError::ChecksumMismatch {
                    file: name.to_owned(),
                    expected: downloads.raw.sha1.clone(),
                    got,
                });
            }
            file_utils::write_atomic(path, &bytes).await?;
        }

        if executable {
            set_executable(path).await?;
        }
        Ok(())
    }

    /// The lzma copy is smaller; the raw one is the fallback.
    async fn download(&self, downloads: &JavaFileDownload) -> Result<Vec<u8>, JavaInstallError> {
        if let Some(lzma) = &downloads.lzma {
            let compressed = self.fetch(&lzma.url).await?;
            let mut reader = std::io::BufReader::new(std::io::Cursor::new(compressed));
            let mut out = Vec::new();
            match lzma_rs::lzma_decompress(&mut reader, &mut out) {
                Ok(()) => return Ok(out),
                Err(error) => err!(
                    "Couldn't decompress lzma file: {error}\n  ({})",
                    lzma.url.bright_black()
                ),
            }
        }
        self.fetch(&downloads.raw.url).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, JavaInstallError> {
        let response = retry(|| async {
            self.transport
                .get(url)
                .await
                .and_then(|n| n.error_for_status())
        })
        .await?;
        Ok(response.body)
    }
}

/// `name` comes from the network, so anything but
/// plain path segments is refused.
fn join_relative(base: &Path, name: &str) -> Result<PathBuf, IoError> {
    let relative = Path::new(name);
    if relative
        .components()
        .any(|n| !matches!(n, Component::Normal(_)))
    {
        return Err(IoError::DirEscapeAttack);
    }
    Ok(base.join(relative))
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<(), IoError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .path(path)
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn set_executable(_path: &Path) -> Result<(), IoError> {
    Ok(())
}

#[cfg(unix)]
async fn make_link(path: &Path, target: &str) {
    _ = tokio::fs::remove_file(path).await;
    if let Err(error) = tokio::fs::symlink(target, path).await {
        err!("Couldn't link {path:?} -> {target}: {error}");
    }
}

#[cfg(not(unix))]
async fn make_link(_path: &Path, _target: &str) {}

#[cfg(test)]
mod tests;
