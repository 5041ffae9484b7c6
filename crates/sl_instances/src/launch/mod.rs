//! Launching the game.
//!
//! [`LaunchOrchestrator`] walks one launch through
//! `ResolvingVersion -> (LegacyPatching) -> (Installing) ->
//! BuildingCommand -> Spawning -> Running` and reports every step
//! on the request's [`ProgressReporter`]. However it ends, the
//! stream finishes with exactly one terminal event followed by
//! `stateChanged(false)`.
//!
//! "Launched" means the process started: the game's
//! lifetime isn't watched here.

use std::{
    fmt::Display,
    path::PathBuf,
    sync::Arc,
};

use owo_colors::OwoColorize;
use sl_core::{
    err, info, json::VersionDetails, pt, settings::JavaMode, DownloadFileError, ErrorKind,
    HttpTransport, JsonFileError, ProgressReporter,
};
use sl_java_handler::JavaInstaller;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    catalog::{CatalogError, VersionCatalog},
    install::{ArtifactInstaller, InstallError},
    session::Session,
};

mod authlib;
pub mod command;
mod game_command;
pub mod legacy;
mod request;
mod spawner;

pub use authlib::ensure_authlib;
pub use command::{build, censor, censor_string, game_options, GameOptions, LaunchCommand};
pub use game_command::{GameCommandCollaborator, VersionJsonCommand};
pub use request::{LaunchOptions, LaunchRequest};
pub use spawner::{LaunchOutcome, ProcessSpawner, SystemSpawner};

const DOWNLOAD_HINT: &str = "Check your internet connection, or try again with a VPN.";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid launch request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("couldn't get authlib-injector (needed for Ely.by accounts):\n{0}\n\n{DOWNLOAD_HINT}")]
    Authlib(DownloadFileError),
    #[error("the installed version files are unreadable:\n{0}\n\nDelete the version folder and launch again to reinstall it.")]
    VersionFiles(JsonFileError),
    #[error("version {0} has no main class. Delete its folder and launch again to reinstall it.")]
    NoMainClass(String),
    #[error("couldn't start {program:?}: {error}\n\nIs Java installed? Set a custom Java path if it isn't on PATH.")]
    Spawn { program: String, error: String },
    #[error("the launch task crashed: {0}")]
    Crashed(String),
}

impl LaunchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            LaunchError::Catalog(error) => error.kind(),
            LaunchError::Install(error) => error.kind(),
            LaunchError::Authlib(DownloadFileError::Request(_))
            | LaunchError::VersionFiles(_)
            | LaunchError::NoMainClass(_) => ErrorKind::DownloadFailed,
            LaunchError::Authlib(DownloadFileError::Io(_)) => ErrorKind::DiskWriteError,
            LaunchError::Spawn { .. } | LaunchError::Crashed(_) => ErrorKind::SpawnError,
        }
    }
}

/// Where a launch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    ResolvingVersion,
    LegacyPatching,
    Installing,
    BuildingCommand,
    Spawning,
    Running,
}

impl Display for LaunchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LaunchState::ResolvingVersion => "Resolving version",
            LaunchState::LegacyPatching => "Applying legacy patch",
            LaunchState::Installing => "Installing",
            LaunchState::BuildingCommand => "Building command",
            LaunchState::Spawning => "Starting game",
            LaunchState::Running => "Running",
        })
    }
}

/// Runs launches. Cheap to share behind an `Arc`;
/// concurrent launches are independent.
pub struct LaunchOrchestrator {
    transport: Arc<dyn HttpTransport>,
    catalog: Arc<VersionCatalog>,
    installer: Arc<ArtifactInstaller>,
    game_command: Arc<dyn GameCommandCollaborator>,
    spawner: Arc<dyn ProcessSpawner>,
    java: JavaInstaller,
    data_dir: PathBuf,
}

impl LaunchOrchestrator {
    /// Uses the version-JSON command builder and real processes.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        catalog: Arc<VersionCatalog>,
        installer: Arc<ArtifactInstaller>,
    ) -> Self {
        let data_dir = installer.data_dir().to_owned();
        Self {
            java: JavaInstaller::new(transport.clone(), &data_dir),
            transport,
            catalog,
            installer,
            game_command: Arc::new(VersionJsonCommand::new(&data_dir)),
            spawner: Arc::new(SystemSpawner),
            data_dir,
        }
    }

    #[must_use]
    pub fn with_game_command(mut self, game_command: Arc<dyn GameCommandCollaborator>) -> Self {
        self.game_command = game_command;
        self
    }

    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Launches the game and returns once it's started.
    ///
    /// An invalid request fails right away without emitting
    /// anything. Otherwise `progress` gets `stateChanged(true)`,
    /// the steps, and a single terminal event.
    ///
    /// `session`: an online session (non-empty token) launches
    /// with that account; anything else plays offline as
    /// `request.username`.
    pub async fn launch(
        &self,
        request: &LaunchRequest,
        session: Option<&Session>,
        progress: &ProgressReporter,
    ) -> Result<LaunchOutcome, LaunchError> {
        request.validate()?;
        progress.started();

        match self.run(request, session, progress).await {
            Ok(outcome) => {
                let pid = outcome
                    .pid
                    .map_or_else(|| "unknown".to_owned(), |n| n.to_string());
                progress.finish_ok(format!("Minecraft started (PID {pid})"));
                Ok(outcome)
            }
            Err(error) => {
                err!("Launch failed: {error}");
                progress.finish_err(error.to_string());
                Err(error)
            }
        }
    }

    /// [`LaunchOrchestrator::launch`] on its own task.
    ///
    /// Validation still happens up front. If the launch task
    /// panics, the stream is closed with an error event.
    pub fn spawn(
        self: Arc<Self>,
        request: LaunchRequest,
        session: Option<Session>,
        progress: ProgressReporter,
    ) -> Result<JoinHandle<Result<LaunchOutcome, LaunchError>>, LaunchError> {
        request.validate()?;
        Ok(tokio::spawn(async move {
            let task_progress = progress.clone();
            let task = tokio::spawn(async move {
                self.launch(&request, session.as_ref(), &task_progress).await
            });
            match task.await {
                Ok(result) => result,
                Err(error) => {
                    let error = LaunchError::Crashed(error.to_string());
                    err!("{error}");
                    progress.finish_err(error.to_string());
                    Err(error)
                }
            }
        }))
    }

    /// Downloads the runtime the version asks for.
    /// On failure the game is started with `java` from PATH.
    async fn provision_java(&self, id: &str, progress: &ProgressReporter) {
        let Ok(details) = VersionDetails::load_merged_s(&self.installer.versions_dir(), id) else {
            return;
        };
        let Some(java) = details.javaVersion else {
            return;
        };
        if let Err(error) = self.java.ensure(&java, progress).await {
            err!("Couldn't install Java {}: {error}", java.majorVersion);
            progress.log(format!("[JavaInstall] {error}"));
        }
    }

    fn enter(state: LaunchState, progress: &ProgressReporter) {
        pt!("{}", state.to_string().bright_black());
        progress.status(state.to_string());
    }

    async fn run(
        &self,
        request: &LaunchRequest,
        session: Option<&Session>,
        progress: &ProgressReporter,
    ) -> Result<LaunchOutcome, LaunchError> {
        info!(
            "Launching {} ({})",
            request.minecraft_version, request.loader
        );

        Self::enter(LaunchState::ResolvingVersion, progress);
        let resolved = self
            .catalog
            .resolve_loader_version(&request.minecraft_version, request.loader)
            .await?;
        let id = resolved.launch_version_id.as_str();
        progress.log(format!("Launch version: {id}"));

        if resolved.is_legacy {
            Self::enter(LaunchState::LegacyPatching, progress);
            let jar = VersionDetails::jar_path(&self.installer.versions_dir(), id);
            match legacy::apply_legacy_patch(self.transport.as_ref(), &jar).await {
                Ok(added) => progress.log(format!("[Legacy] Patch applied ({added} classes)")),
                Err(error) => {
                    // The game may still run without it.
                    err!("Legacy patch failed: {error}");
                    progress.log(format!("[PatchFailed] {error}"));
                }
            }
        }

        if !self.installer.is_installed(id).await {
            Self::enter(LaunchState::Installing, progress);
            self.installer.ensure_installed(id, progress).await?;
        }

        Self::enter(LaunchState::BuildingCommand, progress);
        if request.options.java_selection == JavaMode::Recommended {
            self.provision_java(id, progress).await;
        }
        let options = command::game_options(request, session, &self.data_dir);
        if !options.token.is_empty() {
            ensure_authlib(self.transport.as_ref(), &self.data_dir)
                .await
                .map_err(LaunchError::Authlib)?;
        }
        let base = self.game_command.base_command(id, &options)?;
        let command = command::build(base, &request.options);

        let secrets = [options.token.as_str(), options.uuid.as_str()];
        if let Some(shell) = &command.shell {
            info!("Command (wrapped): {}", censor_string(shell, &secrets));
        } else {
            info!("Command: {:?}", censor(&command.argv, &secrets));
        }

        Self::enter(LaunchState::Spawning, progress);
        let mut outcome = self
            .spawner
            .spawn(&command, &self.data_dir, request.close_on_launch)?;
        outcome.close_launcher = request.close_on_launch;

        Self::enter(LaunchState::Running, progress);
        match outcome.pid {
            Some(pid) => info!("Launched! PID: {pid}"),
            None => err!("No PID for the game process"),
        }
        Ok(outcome)
    }
}
