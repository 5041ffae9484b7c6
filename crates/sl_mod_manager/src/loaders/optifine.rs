//! OptiFine as a regular mod.
//!
//! OptiFine has no headless installer. A third-party patcher
//! script downloads the OptiFine release and turns it into a
//! `*-MOD.jar` that Forge/Fabric setups can load from
//! `mods/<mc>/`.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
    time::{Duration, SystemTime},
};

use owo_colors::OwoColorize;
use regex::Regex;
use sl_core::{
    err, info, pt, retry, IntoIoError, ProgressReporter, OPTIFINE_PATCHER_URL,
};
use tokio_util::sync::CancellationToken;

use super::{
    check_java, shorten,
    subprocess::{run_streaming, RunEnd, RunLimits},
    LoaderInstallError, ModLoaderInstaller,
};

const PATCHER_RUN: RunLimits = RunLimits {
    total: Duration::from_secs(30 * 60),
    inactivity: Duration::from_secs(5 * 60),
};

/// Tried in order until one produces a jar.
/// `-m -f`: move the result and clean up, then plain,
/// then `-r` to download everything again.
const FLAG_SETS: &[&[&str]] = &[&["-m", "-f"], &[], &["-r"]];

const PYTHON_CANDIDATES: &[&[&str]] = &[&["python3"], &["python"], &["py", "-3"], &["py"]];

/// The exit code from the patcher's final line,
/// `Done Patching OptiFine with code <N>`.
#[must_use]
pub fn parse_done_code(line: &str) -> Option<i32> {
    static DONE_LINE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"Done Patching OptiFine with code\s+(-?\d+)").expect("valid regex")
    });
    DONE_LINE
        .captures(line)
        .and_then(|n| n.get(1))
        .and_then(|n| n.as_str().parse().ok())
}

enum PatcherRun {
    Succeeded,
    Failed(String),
}

impl ModLoaderInstaller {
    pub(super) async fn install_optifine(
        &self,
        mc_version: &str,
        optifine_version: Option<&str>,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<String, LoaderInstallError> {
        progress.status("Checking Java");
        check_java(&self.java).await?;

        let work_dir = self.data_dir.join("optifine_patcher");
        tokio::fs::create_dir_all(&work_dir).await.path(&work_dir)?;
        let patcher = work_dir.join("optifine_patcher.py");

        progress.status("Downloading OptiFine patcher");
        retry(|| {
            self.transport
                .download_to_path(OPTIFINE_PATCHER_URL, &patcher)
        })
        .await
        .map_err(|error| match error {
            sl_core::DownloadFileError::Request(error) => LoaderInstallError::Download {
                url: OPTIFINE_PATCHER_URL.to_owned(),
                error,
            },
            sl_core::DownloadFileError::Io(error) => LoaderInstallError::Io(error),
        })?;

        let python = find_python().await.ok_or(LoaderInstallError::PythonNotFound)?;
        pt!("{}: {}", "Python".underline(), python.join(" "));

        // A specific OptiFine release, or the newest for the version.
        let selector = optifine_version.unwrap_or(mc_version);
        let mut failure = String::new();
        let mut result_jar = None;
        for flags in FLAG_SETS {
            if cancel.is_cancelled() {
                return Err(LoaderInstallError::Cancelled);
            }
            progress.status("Patching OptiFine");
            let run = self
                .run_patcher(&python, &patcher, selector, &work_dir, flags, progress, cancel)
                .await?;
            result_jar = find_result_jar(&work_dir).await;
            match run {
                PatcherRun::Succeeded => break,
                PatcherRun::Failed(_) if result_jar.is_some() => break,
                PatcherRun::Failed(message) => {
                    err!("OptiFine patcher failed (flags {flags:?}):\n{message}");
                    failure = message;
                }
            }
        }

        let result_jar = match result_jar {
            Some(n) => n,
            None if failure.is_empty() => {
                return Err(LoaderInstallError::OptiFine(
                    "the patcher finished but no *-MOD.jar was produced".to_owned(),
                ));
            }
            None => return Err(LoaderInstallError::OptiFine(failure)),
        };

        progress.status("Moving OptiFine to the mods folder");
        let mods_dir = self.data_dir.join("mods").join(mc_version);
        let target = move_into(&result_jar, &mods_dir).await?;
        info!("OptiFine saved to {target:?}");

        self.install_base_best_effort(mc_version, progress).await;
        Ok(format!("OptiFine installed for {mc_version}"))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_patcher(
        &self,
        python: &[String],
        patcher: &Path,
        selector: &str,
        work_dir: &Path,
        flags: &[&str],
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PatcherRun, LoaderInstallError> {
        let Some((program, prefix)) = python.split_first() else {
            return Err(LoaderInstallError::PythonNotFound);
        };
        let mut args: Vec<String> = prefix.to_vec();
        args.extend([
            patcher.to_string_lossy().into_owned(),
            "-d".to_owned(),
            selector.to_owned(),
            "-w".to_owned(),
            work_dir.to_string_lossy().into_owned(),
        ]);
        args.extend(flags.iter().map(|n| (*n).to_owned()));
        info!("Running: {program} {}", args.join(" "));

        let mut done_code = None;
        let output = run_streaming(program, &args, work_dir, PATCHER_RUN, cancel, |line| {
            if line.is_empty() {
                return;
            }
            pt!("{} {}", "[OptiFinePatcher]".bright_black(), line);
            progress.status(format!("Patching: {}", shorten(line, 100)));
            progress.log(line);
            if let Some(code) = parse_done_code(line) {
                done_code = Some(code);
            }
        })
        .await
        .map_err(|n| LoaderInstallError::Process {
            program: program.clone(),
            error: n.to_string(),
        })?;

        let code = match output.end {
            RunEnd::Cancelled => return Err(LoaderInstallError::Cancelled),
            RunEnd::TimedOut(timeout) => {
                return Ok(PatcherRun::Failed(format!(
                    "the patcher was stopped ({timeout})\n{}",
                    output.tail()
                )));
            }
            RunEnd::Exited(Some(code)) => {
                if done_code.is_some_and(|n| n != code) {
                    err!("Patcher reported code {done_code:?} but exited with {code}");
                }
                Some(code)
            }
            RunEnd::Exited(None) => done_code,
        };

        Ok(match code {
            Some(0) => PatcherRun::Succeeded,
            Some(code) => {
                PatcherRun::Failed(format!("the patcher exited with code {code}\n{}", output.tail()))
            }
            None => PatcherRun::Failed(format!("the patcher was killed\n{}", output.tail())),
        })
    }
}

/// Tries each candidate's `--version` and keeps the
/// first that reports Python 3.
async fn find_python() -> Option<Vec<String>> {
    for candidate in PYTHON_CANDIDATES {
        let Some((program, args)) = candidate.split_first() else {
            continue;
        };
        let mut command = tokio::process::Command::new(program);
        command.args(args.iter()).arg("--version").kill_on_drop(true);
        sl_core::no_window!(command);

        let Ok(Ok(output)) =
            tokio::time::timeout(Duration::from_secs(10), command.output()).await
        else {
            continue;
        };
        // Old versions print to stderr.
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
        .to_lowercase();
        if output.status.success() && text.contains("python 3") {
            return Some(candidate.iter().map(|n| (*n).to_owned()).collect());
        }
    }
    None
}

fn is_result_jar(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().to_lowercase().ends_with("-mod.jar"))
}

/// The newest `*-MOD.jar`: top level first,
/// then anywhere below.
async fn find_result_jar(work_dir: &Path) -> Option<PathBuf> {
    let work_dir = work_dir.to_owned();
    tokio::task::spawn_blocking(move || {
        let newest = |max_depth: usize| {
            walkdir::WalkDir::new(&work_dir)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|n| n.file_type().is_file() && is_result_jar(n.path()))
                .max_by_key(|n| {
                    n.metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .unwrap_or(SystemTime::UNIX_EPOCH)
                })
                .map(walkdir::DirEntry::into_path)
        };
        newest(1).or_else(|| newest(usize::MAX))
    })
    .await
    .ok()
    .flatten()
}

/// Moves `file` into `dir`, copying if a rename
/// isn't possible (different drives).
async fn move_into(file: &Path, dir: &Path) -> Result<PathBuf, LoaderInstallError> {
    tokio::fs::create_dir_all(dir).await.path(dir)?;
    let Some(name) = file.file_name() else {
        return Err(LoaderInstallError::OptiFine(format!(
            "bad result path {file:?}"
        )));
    };
    let target = dir.join(name);
    if tokio::fs::rename(file, &target).await.is_err() {
        tokio::fs::copy(file, &target).await.path(&target)?;
        _ = tokio::fs::remove_file(file).await;
    }
    Ok(target)
}
