//! Core utilities for the 16Launcher crates.
//!
//! **Not recommended to use in your own projects!**
//!
//! # Contains
//! - File and download utilities
//! - The [`HttpTransport`] seam used by every network caller
//! - Error types and the flat [`ErrorKind`] taxonomy
//! - JSON structs for the Mojang manifest and version files
//! - Settings store, mirror configuration
//! - Logging macros
//! - Progress events

#![allow(clippy::missing_errors_doc)]

use futures::StreamExt;
use std::{
    future::Future,
    sync::{LazyLock, Mutex},
    time::Duration,
};

pub mod constants;
mod error;
/// Common utilities for working with files.
pub mod file_utils;
/// JSON structs for the version manifest and version files.
pub mod json;
mod loader;
pub mod mirrors;
/// Logging macros.
pub mod print;
mod progress;
pub mod settings;
pub mod transport;

pub use constants::*;
pub use error::{
    DownloadFileError, ErrorKind, IntoIoError, IntoJsonError, IoError,
    JsonDownloadError, JsonError, JsonFileError,
};
pub use file_utils::RequestError;
pub use loader::{LoaderType, ParseLoaderError};
pub use mirrors::{MirrorConfig, MirrorSource};
pub use print::{logger_finish, LogType, LoggingState, LOGGER};
pub use progress::{EventLog, ProgressEvent, ProgressKind, ProgressReporter, ProgressSink};
pub use settings::{JsonSettingsStore, LauncherSettings, SettingsStore};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, ScriptedTransport};

pub const CLASSPATH_SEPARATOR: char = if cfg!(unix) { ':' } else { ';' };

pub static REDACT_SENSITIVE_INFO: LazyLock<Mutex<bool>> = LazyLock::new(|| Mutex::new(true));

pub const LAUNCHER_NAME: &str = "16Launcher";
pub const LAUNCHER_VERSION_NAME: &str = "1.0.3";

/// To prevent spawning of terminal (windows only).
///
/// Takes in a `Command` (owned or mutable reference, both are fine).
/// This supports `process::Command` of both `tokio` and `std`.
#[macro_export]
macro_rules! no_window {
    ($cmd:expr) => {
        #[cfg(target_os = "windows")]
        {
            #[allow(unused_imports)]
            use std::os::windows::process::CommandExt;
            // 0x08000000 => CREATE_NO_WINDOW
            $cmd.creation_flags(0x08000000);
        }
    };
}

/// Like [`no_window`] but also detaches the child into
/// its own process group, so closing the launcher's
/// console doesn't take the game down with it.
#[macro_export]
macro_rules! detached_no_window {
    ($cmd:expr) => {
        #[cfg(target_os = "windows")]
        {
            #[allow(unused_imports)]
            use std::os::windows::process::CommandExt;
            // 0x00000200 => CREATE_NEW_PROCESS_GROUP
            // 0x08000000 => CREATE_NO_WINDOW
            $cmd.creation_flags(0x00000200 | 0x08000000);
        }
    };
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(format!("{LAUNCHER_NAME}/{LAUNCHER_VERSION_NAME}"))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_default()
});

/// A client that never follows redirects on its own.
///
/// Used where the caller has to look at every hop
/// (for example, to skip blocked mirror domains).
pub static NO_REDIRECT_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(format!("{LAUNCHER_NAME}/{LAUNCHER_VERSION_NAME}"))
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_default()
});

/// Executes multiple async tasks concurrently (e.g., downloading files).
///
/// # Calling
///
/// - Takes in `Iterator` over `Future` (the thing returned by `async fn -> Result<T, E>`).
/// - Returns `Result<Vec<T>, E>`.
///
/// The entire operation fails if any task fails.
///
/// # Example
/// ```no_run
/// # use sl_core::do_jobs;
/// # async fn download_file(url: &str) -> Result<String, String> {
/// #     Ok("Hello".to_owned())
/// # }
/// # async fn trying() -> Result<(), String> {
/// #   let files: [&str; 1] = ["test"];
/// do_jobs(files.iter().map(|url| {
///     // Async function that returns Result<T, E>
///     // No need to await
///     download_file(url)
/// })).await?;
/// #   Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns whatever error the input function returns.
pub async fn do_jobs<T, E>(
    results: impl Iterator<Item = impl Future<Output = Result<T, E>>>,
) -> Result<Vec<T>, E> {
    #[cfg(target_os = "macos")]
    const JOBS: usize = 32;
    #[cfg(not(target_os = "macos"))]
    const JOBS: usize = 64;
    do_jobs_with_limit(results, JOBS).await
}

/// Executes multiple async tasks concurrently,
/// with an **explicit limit** on concurrent jobs.
///
/// This lets you stay under any `ulimit -n`
/// file descriptor limits.
///
/// # Errors
/// Returns whatever error the input function returns.
pub async fn do_jobs_with_limit<T, E>(
    results: impl Iterator<Item = impl Future<Output = Result<T, E>>>,
    limit: usize,
) -> Result<Vec<T>, E> {
    let mut tasks = futures::stream::FuturesUnordered::new();
    let mut outputs = Vec::new();

    for result in results {
        tasks.push(result);
        if tasks.len() > limit {
            if let Some(task) = tasks.next().await {
                outputs.push(task?);
            }
        }
    }

    while let Some(task) = tasks.next().await {
        outputs.push(task?);
    }
    Ok(outputs)
}

/// Retries a non-deterministic function a few times if it fails.
///
/// Useful for inherently unreliable operations (e.g., network requests) that may
/// fail intermittently. Only wrap the flaky part: an error that will
/// happen again no matter what (bad checksum, full disk) shouldn't be retried.
///
/// # Example
/// ```no_run
/// # use sl_core::retry;
/// async fn download_file(url: &str) -> Result<String, String> {
///     // Insert network operation here
///     Ok("Hi".to_owned())
/// }
/// # async fn download_something_important() -> Result<String, String> {
/// retry(|| download_file("example.com/my_file")).await
/// # }
/// ```
///
/// # Errors
/// Returns whatever error the original function returned.
pub async fn retry<T, E, Res, Func>(f: Func) -> Result<T, E>
where
    Res: Future<Output = Result<T, E>>,
    Func: Fn() -> Res,
{
    const LIMIT: usize = 3;
    let mut result = f().await;
    for _ in 0..LIMIT {
        if result.is_ok() {
            break;
        }
        result = f().await;
    }
    result
}
