use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

use crate::RequestError;

/// Quickly implement `From<>` the "big 3" generic error types
/// ([`JsonFileError`], [`JsonDownloadError`], [`DownloadFileError`])
/// for your error types.
///
/// Pass in the name of your error `enum` and the specific variants in the correct order.
/// The JRI stands for the order of arguments: "Json, Request, Io".
///
/// ```no_run
/// use sl_core::{impl_3_errs_jri, IoError, JsonError, RequestError};
///
/// enum MyError {
///     IoErr(IoError),
///     Req(RequestError),
///     Json(JsonError)
/// }
///
/// impl_3_errs_jri!(MyError, Json, Req, IoErr);
/// ```
#[macro_export]
macro_rules! impl_3_errs_jri {
    ($target:ident, $json_variant:ident, $request_variant:ident, $io_variant:ident) => {
        impl From<$crate::JsonFileError> for $target {
            fn from(value: $crate::JsonFileError) -> Self {
                match value {
                    $crate::JsonFileError::SerdeError(err) => Self::$json_variant(err),
                    $crate::JsonFileError::Io(err) => Self::$io_variant(err),
                }
            }
        }
        impl From<$crate::JsonDownloadError> for $target {
            fn from(value: $crate::JsonDownloadError) -> Self {
                match value {
                    $crate::JsonDownloadError::RequestError(err) => Self::$request_variant(err),
                    $crate::JsonDownloadError::SerdeError(err) => Self::$json_variant(err),
                }
            }
        }
        impl From<$crate::DownloadFileError> for $target {
            fn from(value: $crate::DownloadFileError) -> Self {
                match value {
                    $crate::DownloadFileError::Request(err) => Self::$request_variant(err),
                    $crate::DownloadFileError::Io(err) => Self::$io_variant(err),
                }
            }
        }
    };
}

/// Machine-readable category of a failure.
///
/// Every error type in the launcher crates maps onto
/// one of these through a `kind()` method. The CLI prints
/// [`ErrorKind::as_str`] and exits with [`ErrorKind::exit_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    CatalogUnavailable,
    LoaderNotFound,
    LoaderResolutionError,
    LoaderNotInstalled,
    DownloadFailed,
    ChecksumMismatch,
    AllMirrorsFailed,
    DiskWriteError,
    InstallerExitNonZero,
    FabricInstallError,
    OptiFineInstallError,
    JavaNotFound,
    PythonNotFound,
    AuthenticationFailed,
    SpawnError,
    PatchFailed,
    Cancelled,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::CatalogUnavailable => "catalog_unavailable",
            ErrorKind::LoaderNotFound => "loader_not_found",
            ErrorKind::LoaderResolutionError => "loader_resolution_error",
            ErrorKind::LoaderNotInstalled => "loader_not_installed",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::ChecksumMismatch => "checksum_mismatch",
            ErrorKind::AllMirrorsFailed => "all_mirrors_failed",
            ErrorKind::DiskWriteError => "disk_write_error",
            ErrorKind::InstallerExitNonZero => "installer_exit_non_zero",
            ErrorKind::FabricInstallError => "fabric_install_error",
            ErrorKind::OptiFineInstallError => "optifine_install_error",
            ErrorKind::JavaNotFound => "java_not_found",
            ErrorKind::PythonNotFound => "python_not_found",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::SpawnError => "spawn_error",
            ErrorKind::PatchFailed => "patch_failed",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Process exit code for the CLI. Never zero.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InvalidRequest => 2,
            ErrorKind::CatalogUnavailable => 10,
            ErrorKind::LoaderNotFound => 11,
            ErrorKind::LoaderResolutionError => 12,
            ErrorKind::LoaderNotInstalled => 13,
            ErrorKind::DownloadFailed => 20,
            ErrorKind::ChecksumMismatch => 21,
            ErrorKind::AllMirrorsFailed => 22,
            ErrorKind::DiskWriteError => 23,
            ErrorKind::InstallerExitNonZero => 30,
            ErrorKind::FabricInstallError => 31,
            ErrorKind::OptiFineInstallError => 32,
            ErrorKind::JavaNotFound => 33,
            ErrorKind::PythonNotFound => 34,
            ErrorKind::AuthenticationFailed => 40,
            ErrorKind::SpawnError => 50,
            ErrorKind::PatchFailed => 51,
            ErrorKind::Cancelled => 130,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error)]
pub enum IoError {
    #[error("at path {path:?}, error: {error}")]
    Io { error: String, path: PathBuf },
    #[error("couldn't read directory {parent:?}, error {error}")]
    ReadDir { error: String, parent: PathBuf },
    #[error("home or AppData directory not found")]
    LauncherDirNotFound,
    #[error("directory is outside parent directory. POTENTIAL SECURITY RISK AVOIDED")]
    DirEscapeAttack,
}

/// Converts any `std::io::Result<T>` into
/// `Result<T, IoError>`.
///
/// This allows you to use our [`IoError`] type
/// which has more context.
///
/// # Example
///
/// ```no_run
/// # use std::path::Path;
/// # use sl_core::IntoIoError;
/// # fn f() -> Result<(), sl_core::IoError> {
/// let p = Path::new("some_file.txt");
/// std::fs::write(p, "hi").path(p)?;
/// // Here, if this fails, the error message
/// // will tell you what path it tried writing to.
/// # Ok(())
/// # }
/// ```
pub trait IntoIoError<T = ()> {
    type Output;
    fn path(self, p: impl Into<PathBuf>) -> Self::Output;
    fn dir(self, p: impl Into<PathBuf>) -> Self::Output;
}

impl<T> IntoIoError<T> for std::io::Result<T> {
    type Output = Result<T, IoError>;
    fn path(self, p: impl Into<PathBuf>) -> Result<T, IoError> {
        self.map_err(|err| IoError::Io {
            error: err.to_string(),
            path: p.into(),
        })
    }

    fn dir(self, p: impl Into<PathBuf>) -> Result<T, IoError> {
        self.map_err(|err| IoError::ReadDir {
            error: err.to_string(),
            parent: p.into(),
        })
    }
}

impl IntoIoError for std::io::Error {
    type Output = IoError;
    fn path(self, p: impl Into<PathBuf>) -> IoError {
        IoError::Io {
            error: self.to_string(),
            path: p.into(),
        }
    }

    fn dir(self, p: impl Into<PathBuf>) -> IoError {
        IoError::ReadDir {
            error: self.to_string(),
            parent: p.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JsonDownloadError {
    #[error(transparent)]
    RequestError(#[from] RequestError),
    #[error(transparent)]
    SerdeError(#[from] JsonError),
}

#[derive(Debug, Error)]
pub enum DownloadFileError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Io(#[from] IoError),
}

#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error(transparent)]
    SerdeError(#[from] JsonError),
    #[error(transparent)]
    Io(#[from] IoError),
}

const JSON_ERR_PREFIX: &str = "could not parse JSON:\n";

#[derive(Debug, Error)]
pub enum JsonError {
    #[error("{JSON_ERR_PREFIX}while parsing JSON:\n{error}\n\n{json}")]
    From {
        error: serde_json::Error,
        json: String,
    },
    #[error("{JSON_ERR_PREFIX}while converting object to JSON:\n{error}")]
    To { error: serde_json::Error },
}

pub trait IntoJsonError<T> {
    fn json(self, p: String) -> Result<T, JsonError>;
    fn json_to(self) -> Result<T, JsonError>;
}

impl<T> IntoJsonError<T> for Result<T, serde_json::Error> {
    fn json(self, json: String) -> Result<T, JsonError> {
        self.map_err(|error: serde_json::Error| JsonError::From { error, json })
    }

    fn json_to(self) -> Result<T, JsonError> {
        self.map_err(|error: serde_json::Error| JsonError::To { error })
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorKind;

    #[test]
    fn exit_codes_are_never_zero() {
        let all = [
            ErrorKind::InvalidRequest,
            ErrorKind::CatalogUnavailable,
            ErrorKind::LoaderNotFound,
            ErrorKind::LoaderResolutionError,
            ErrorKind::LoaderNotInstalled,
            ErrorKind::DownloadFailed,
            ErrorKind::ChecksumMismatch,
            ErrorKind::AllMirrorsFailed,
            ErrorKind::DiskWriteError,
            ErrorKind::InstallerExitNonZero,
            ErrorKind::FabricInstallError,
            ErrorKind::OptiFineInstallError,
            ErrorKind::JavaNotFound,
            ErrorKind::PythonNotFound,
            ErrorKind::AuthenticationFailed,
            ErrorKind::SpawnError,
            ErrorKind::PatchFailed,
            ErrorKind::Cancelled,
        ];
        let mut seen = std::collections::HashSet::new();
        for kind in all {
            assert_ne!(kind.exit_code(), 0, "{kind}");
            assert!(seen.insert(kind.exit_code()), "duplicate code for {kind}");
        }
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(ErrorKind::AllMirrorsFailed.as_str(), "all_mirrors_failed");
        assert_eq!(ErrorKind::OptiFineInstallError.to_string(), "optifine_install_error");
    }
}
