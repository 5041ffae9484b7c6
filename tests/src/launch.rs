use std::time::{Duration, Instant};

use owo_colors::OwoColorize;
use sl_core::{err, LoaderType, ProgressReporter};
use sl_instances::{LaunchOptions, LaunchOrchestrator, LaunchRequest};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Launches `version` and checks the game is still running
/// after `alive_for`. The game is killed afterwards.
pub async fn launch(
    orchestrator: &LaunchOrchestrator,
    version: &str,
    loader: LoaderType,
    alive_for: Duration,
) -> bool {
    let request = LaunchRequest {
        minecraft_version: version.to_owned(),
        loader,
        username: "SmokeTest".to_owned(),
        close_on_launch: false,
        options: LaunchOptions::default(),
    };
    let outcome = match orchestrator
        .launch(&request, None, &ProgressReporter::silent())
        .await
    {
        Ok(n) => n,
        Err(error) => {
            err!("{version} ({loader}) [{}]: {error}", error.kind());
            return false;
        }
    };
    let (Some(pid), Some(mut child)) = (outcome.pid, outcome.child) else {
        err!("{version} ({loader}): no process handle");
        return false;
    };

    let started = Instant::now();
    while started.elapsed() < alive_for {
        tokio::time::sleep(Duration::from_secs(1)).await;
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                err!("{version} ({loader}) exited early: {status}");
                return false;
            }
            Err(error) => {
                err!("{version} ({loader}): {error}");
                return false;
            }
        }
    }

    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    let Some(process) = sys.process(pid) else {
        err!("{version} ({loader}): process {pid} disappeared");
        return false;
    };
    println!(
        "{} {version} ({loader}), {} MB after {}s",
        "Alive:".green().bold(),
        process.memory() / 1024 / 1024,
        alive_for.as_secs()
    );

    if !process.kill() {
        _ = child.start_kill();
    }
    _ = child.wait().await;
    true
}
