use std::{path::Path, process::Stdio};

use sl_core::detached_no_window;
use tokio::process::{Child, Command};

use super::{command::LaunchCommand, LaunchError};

/// The started game.
#[derive(Debug)]
pub struct LaunchOutcome {
    pub pid: Option<u32>,
    /// `None` when the spawner doesn't hand out the process
    /// (test spawners, or a child that's been detached).
    pub child: Option<Child>,
    /// The caller asked for the launcher to exit now.
    pub close_launcher: bool,
}

/// Starts processes. Swapped out in tests.
pub trait ProcessSpawner: Send + Sync {
    /// `detach`: the launcher won't be around to read the
    /// game's output, so don't tie the child's stdio to it.
    fn spawn(
        &self,
        command: &LaunchCommand,
        working_dir: &Path,
        detach: bool,
    ) -> Result<LaunchOutcome, LaunchError>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Default)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn(
        &self,
        command: &LaunchCommand,
        working_dir: &Path,
        detach: bool,
    ) -> Result<LaunchOutcome, LaunchError> {
        let (program, mut process) = if let Some(shell) = &command.shell {
            let mut process = if cfg!(windows) {
                let mut n = Command::new("cmd");
                n.arg("/C");
                n
            } else {
                let mut n = Command::new("sh");
                n.arg("-c");
                n
            };
            process.arg(shell);
            (shell.clone(), process)
        } else {
            let Some((program, args)) = command.argv.split_first() else {
                return Err(LaunchError::Spawn {
                    program: String::new(),
                    error: "empty command".to_owned(),
                });
            };
            let mut process = Command::new(program);
            process.args(args);
            (program.clone(), process)
        };

        process.current_dir(working_dir);
        if detach {
            process
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        } else {
            process
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
        detached_no_window!(process);

        let child = process.spawn().map_err(|error| LaunchError::Spawn {
            program,
            error: error.to_string(),
        })?;
        Ok(LaunchOutcome {
            pid: child.id(),
            child: Some(child),
            close_launcher: false,
        })
    }
}
