//! Forge, through its official installer.
//!
//! # Steps
//! 1. Pick the build (given, or the newest for the version)
//! 2. Download `forge-<build>-installer.jar` (mirrors, then proxy)
//! 3. Install the base version, check `java -version`
//! 4. `java -jar <installer> --installClient <dataDir>`,
//!    once more with simpler arguments if that fails
//! 5. If the installer choked on a corrupt cached library,
//!    delete it and start over (a few times at most)

use std::{path::Path, time::Duration};

use owo_colors::OwoColorize;
use sl_core::{err, file_utils, info, pt, IntoIoError, ProgressReporter};
use sl_instances::catalog::forge_launch_id;
use tokio_util::sync::CancellationToken;

use super::{
    check_java, shorten,
    subprocess::{run_streaming, RunEnd, RunLimits, RunOutput},
    LoaderInstallError, ModLoaderInstaller,
};

mod download;
mod heal;

pub use heal::failed_checksum_path;

const FULL_RUN: RunLimits = RunLimits {
    total: Duration::from_secs(300),
    inactivity: Duration::from_secs(180),
};
const SIMPLE_RUN: RunLimits = RunLimits {
    total: Duration::from_secs(120),
    inactivity: Duration::from_secs(120),
};
const HEAL_ATTEMPTS: usize = 3;

impl ModLoaderInstaller {
    pub(super) async fn install_forge(
        &self,
        mc_version: &str,
        build_hint: Option<&str>,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<String, LoaderInstallError> {
        info!("Installing Forge for {mc_version}");
        progress.status("Looking up Forge version");
        let build = match build_hint {
            Some(n) if n.starts_with(&format!("{mc_version}-")) => n.to_owned(),
            Some(n) => format!("{mc_version}-{n}"),
            None => self.catalog.latest_forge_build(mc_version).await?,
        };
        pt!("{}: {build}", "Forge build".underline());

        let temp_dir = self.data_dir.join("temp_forge");
        tokio::fs::create_dir_all(&temp_dir).await.path(&temp_dir)?;
        let installer_path = temp_dir.join(format!("forge-{build}-installer.jar"));

        let result = self
            .download_and_run_installer(mc_version, &build, &installer_path, progress, cancel)
            .await;

        _ = tokio::fs::remove_file(&installer_path).await;
        file_utils::remove_dir_if_empty(&temp_dir).await;
        result?;

        let id = forge_launch_id(mc_version, &build);
        if !file_utils::exists(self.data_dir.join("versions").join(&id)).await {
            err!("The installer finished but versions/{id} doesn't exist");
            progress.log(format!("Warning: versions/{id} wasn't created"));
        }
        Ok(format!("Forge {build} installed"))
    }

    async fn download_and_run_installer(
        &self,
        mc_version: &str,
        build: &str,
        installer_path: &Path,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), LoaderInstallError> {
        progress.status("Downloading Forge installer");
        let bytes = download::download_installer(
            self.transport.as_ref(),
            &self.forge_mirrors,
            build,
            progress,
            cancel,
        )
        .await?;
        file_utils::write_atomic(installer_path, &bytes).await?;

        self.install_base_best_effort(mc_version, progress).await;

        progress.status("Checking Java");
        check_java(&self.java).await?;
        self.write_launcher_profiles().await?;

        progress.status("Running Forge installer (this might take a while)");
        self.run_installer(installer_path, progress, cancel).await
    }

    /// The installer refuses to run without this file.
    async fn write_launcher_profiles(&self) -> Result<(), LoaderInstallError> {
        let path = self.data_dir.join("launcher_profiles.json");
        if !file_utils::exists(&path).await {
            tokio::fs::write(&path, r#"{"profiles":{}}"#)
                .await
                .path(&path)?;
        }
        Ok(())
    }

    async fn run_installer(
        &self,
        installer_path: &Path,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), LoaderInstallError> {
        let jar = installer_path.to_string_lossy().into_owned();
        let full = vec![
            "-jar".to_owned(),
            jar.clone(),
            "--installClient".to_owned(),
            self.data_dir.to_string_lossy().into_owned(),
        ];
        let simple = vec!["-jar".to_owned(), jar, "--installClient".to_owned()];

        let mut last_output = None;
        for attempt in 1..=HEAL_ATTEMPTS {
            let output = self.run_java(&full, FULL_RUN, progress, cancel).await?;
            if output.succeeded() {
                return Ok(());
            }

            let output = if heal::mentions_checksum(&output.lines) {
                output
            } else {
                err!(
                    "Forge installer failed ({}), retrying with simpler arguments",
                    describe(output.end)
                );
                progress.status("Retrying Forge installer");
                let retry = self.run_java(&simple, SIMPLE_RUN, progress, cancel).await?;
                if retry.succeeded() {
                    return Ok(());
                }
                if !heal::mentions_checksum(&retry.lines) {
                    return Err(installer_failed(&retry));
                }
                retry
            };

            info!("Checksum failure, attempt {attempt}/{HEAL_ATTEMPTS}");
            heal::delete_failed_jar(&output.lines, &self.data_dir, progress).await;
            last_output = Some(output);
        }

        Err(last_output.map_or_else(
            || LoaderInstallError::InstallerExitNonZero {
                reason: "never ran".to_owned(),
                output: String::new(),
            },
            |n| installer_failed(&n),
        ))
    }

    async fn run_java(
        &self,
        args: &[String],
        limits: RunLimits,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<RunOutput, LoaderInstallError> {
        if cancel.is_cancelled() {
            return Err(LoaderInstallError::Cancelled);
        }
        let java = self.java.to_string_lossy();
        info!("Running: {java} {}", args.join(" "));

        let output = run_streaming(&java, args, &self.data_dir, limits, cancel, |line| {
            if line.trim().is_empty() {
                return;
            }
            pt!("{}", line.bright_black());
            if line.contains("Progress") || line.contains('%') || line.contains("Downloading") {
                progress.status(format!("Installing: {}", shorten(line, 80)));
            }
            progress.log(line);
        })
        .await
        .map_err(|n| LoaderInstallError::Process {
            program: java.clone().into_owned(),
            error: n.to_string(),
        })?;

        if output.end == RunEnd::Cancelled {
            return Err(LoaderInstallError::Cancelled);
        }
        Ok(output)
    }
}

fn describe(end: RunEnd) -> String {
    match end {
        RunEnd::Exited(Some(code)) => format!("exit code {code}"),
        RunEnd::Exited(None) => "killed".to_owned(),
        RunEnd::TimedOut(timeout) => format!("timed out: {timeout}"),
        RunEnd::Cancelled => "cancelled".to_owned(),
    }
}

fn installer_failed(output: &RunOutput) -> LoaderInstallError {
    let tail = output.tail();
    LoaderInstallError::InstallerExitNonZero {
        reason: describe(output.end),
        output: if tail.is_empty() {
            "(no output)".to_owned()
        } else {
            tail
        },
    }
}


#[cfg(all(test, unix))]
mod installer_runs {
    use std::{
        os::unix::fs::PermissionsExt,
        path::{Path, PathBuf},
        sync::Arc,
    };

    use sl_core::{
        mirrors::{ArtifactMirrors, ForgeMirrors},
        ErrorKind, ProgressReporter, ScriptedTransport,
    };
    use sl_instances::{ArtifactInstaller, VersionCatalog};
    use tokio_util::sync::CancellationToken;

    use crate::ModLoaderInstaller;

    /// A `java` that logs its arguments to `calls` and then
    /// runs `body`. `$#` is 4 for the full argument set
    /// and 3 for the simplified one.
    fn fake_java(dir: &tempfile::TempDir, body: &str) -> (PathBuf, PathBuf) {
        let calls = dir.path().join("calls");
        let script = dir.path().join("java.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$#\" >> '{}'\n{body}\n", calls.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, calls)
    }

    fn loaders(dir: &tempfile::TempDir, java: PathBuf) -> ModLoaderInstaller {
        let transport = Arc::new(ScriptedTransport::new());
        let catalog = Arc::new(VersionCatalog::new(transport.clone(), dir.path()));
        let installer = Arc::new(ArtifactInstaller::new(
            transport.clone(),
            catalog.clone(),
            dir.path(),
            ArtifactMirrors::default(),
        ));
        ModLoaderInstaller::new(transport, catalog, installer, ForgeMirrors::default())
            .with_java(java)
    }

    fn calls(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn plain_failure_retries_with_simple_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let (java, log) = fake_java(
            &dir,
            r#"echo "  File exists: Checksum validated."
if [ "$#" -eq 4 ]; then
  echo "java.lang.OutOfMemoryError: Java heap space"
  echo "There was an error during installation"
  exit 1
fi
echo "Successfully installed client"
exit 0"#,
        );
        let loaders = loaders(&dir, java);

        loaders
            .run_installer(
                &dir.path().join("forge-installer.jar"),
                &ProgressReporter::silent(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(calls(&log), ["4", "3"]);
    }

    #[tokio::test]
    async fn simple_retry_failing_ends_the_install() {
        let dir = tempfile::tempdir().unwrap();
        let (java, log) = fake_java(
            &dir,
            r#"echo "  File exists: Checksum validated."
echo "There was an error during installation"
exit 1"#,
        );
        let loaders = loaders(&dir, java);

        let error = loaders
            .run_installer(
                &dir.path().join("forge-installer.jar"),
                &ProgressReporter::silent(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InstallerExitNonZero);
        assert_eq!(calls(&log), ["4", "3"]);
    }

    #[tokio::test]
    async fn checksum_failure_deletes_the_jar_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("libraries/org/ow2/asm/asm/9.5/asm-9.5.jar");
        std::fs::create_dir_all(library.parent().unwrap()).unwrap();
        std::fs::write(&library, b"corrupt").unwrap();

        let (java, log) = fake_java(
            &dir,
            &format!(
                "echo \"Checksum mismatch for {}\"\nexit 1",
                library.display()
            ),
        );
        let loaders = loaders(&dir, java);

        let error = loaders
            .run_installer(
                &dir.path().join("forge-installer.jar"),
                &ProgressReporter::silent(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InstallerExitNonZero);
        assert_eq!(calls(&log), ["4", "4", "4"]);
        assert!(!library.exists());
    }
}
