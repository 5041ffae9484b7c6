use std::{fmt::Display, path::PathBuf, process::exit, sync::Arc, time::Duration};

use clap::Parser;
use sl_core::{
    do_jobs, eeprintln, file_utils, print::LogConfig, LoaderType, MirrorConfig, ProgressReporter,
    ReqwestTransport,
};
use sl_instances::{ArtifactInstaller, LaunchOrchestrator, VersionCatalog};
use sl_mod_manager::ModLoaderInstaller;
use tokio_util::sync::CancellationToken;

use crate::version::{Version, VERSIONS_LWJGL2, VERSIONS_LWJGL3};

mod launch;
mod version;

#[derive(clap::Parser)]
#[command(
    long_about = "A test suite that installs and launches different versions of Minecraft with different mod loaders."
)]
struct Cli {
    #[arg(short, long)]
    #[arg(help = "Whether to reuse existing test files instead of redownloading them")]
    existing: bool,
    #[arg(
        long,
        help = "Only tests legacy LWJGL2-based versions (1.12.2 and below)"
    )]
    skip_lwjgl3: bool,
    #[arg(long)]
    #[arg(help = "How long the game has to stay running, per launch (default: 20).")]
    timeout: Option<u64>,
    #[arg(short, long)]
    #[arg(help = "See all the logs to diagnose issues")]
    verbose: bool,
}

impl Cli {
    fn get_versions(&self) -> impl Iterator<Item = &Version> {
        VERSIONS_LWJGL2.iter().chain(
            (!self.skip_lwjgl3)
                .then_some(VERSIONS_LWJGL3.iter())
                .into_iter()
                .flatten(),
        )
    }
}

fn attempt<T, E: Display>(r: Result<T, E>) -> T {
    match r {
        Ok(n) => n,
        Err(err) => {
            eeprintln!("\nERROR: {err}");
            exit(1);
        }
    }
}

#[tokio::main]
#[allow(unreachable_code)]
async fn main() {
    set_terminal(true);
    let cli = Cli::parse();
    let dir = attempt(setup_dir());
    check_java();

    let transport = Arc::new(ReqwestTransport::default());
    let mirrors = MirrorConfig::load_or_default(&dir);
    let catalog = Arc::new(VersionCatalog::new(transport.clone(), &dir));
    let installer = Arc::new(ArtifactInstaller::new(
        transport.clone(),
        catalog.clone(),
        &dir,
        mirrors.artifacts,
    ));

    if !cli.existing {
        _ = tokio::fs::remove_dir_all(dir.join("versions")).await;
    }
    attempt(
        do_jobs(cli.get_versions().map(|version| {
            let installer = installer.clone();
            async move {
                installer
                    .ensure_installed(version.0, &ProgressReporter::silent())
                    .await
            }
        }))
        .await,
    );

    #[cfg(any(
        feature = "simulate_linux_arm64",
        feature = "simulate_macos_arm64",
        feature = "simulate_linux_arm32",
    ))]
    return;

    let loaders = ModLoaderInstaller::new(
        transport.clone(),
        catalog.clone(),
        installer.clone(),
        mirrors.forge,
    );
    let orchestrator = LaunchOrchestrator::new(transport, catalog, installer);
    let alive_for = Duration::from_secs(cli.timeout.unwrap_or(20));
    let cancel = CancellationToken::new();
    let mut fails = Vec::new();

    for Version(name, version_loaders) in cli.get_versions() {
        set_terminal(cli.verbose);
        if !launch::launch(&orchestrator, name, LoaderType::Vanilla, alive_for).await {
            fails.push((*name, LoaderType::Vanilla));
        }
        for loader in *version_loaders {
            println!("(Loader: {loader})");
            if let Err(err) = loaders
                .install(*loader, name, None, &ProgressReporter::silent(), &cancel)
                .await
            {
                eeprintln!("[{}] {err}", err.kind());
                fails.push((*name, *loader));
                continue;
            }

            println!("Done");
            if !launch::launch(&orchestrator, name, *loader, alive_for).await {
                fails.push((*name, *loader));
            }
        }
    }

    if !fails.is_empty() {
        println!("\nTEST FAILURES:");
        for (name, loader) in &fails {
            println!("{name}: {loader}");
        }
        exit(1);
    }
}

/// Points the launcher at a throwaway folder next to this crate.
fn setup_dir() -> Result<PathBuf, sl_core::IoError> {
    let new_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("16Launcher");
    _ = std::fs::remove_dir_all(new_dir.join("logs"));
    unsafe {
        std::env::set_var("SL_DIR", &new_dir);
    }
    file_utils::get_launcher_dir()
}

fn check_java() {
    let Ok(java) = which::which("java") else {
        eeprintln!("java isn't installed! Please install it first.");
        exit(1);
    };
    match duct::cmd(&java, ["-version"]).stderr_to_stdout().read() {
        Ok(n) => println!("Java: {}", n.lines().next().unwrap_or_default()),
        Err(err) => {
            eeprintln!("{java:?} -version failed: {err}");
            exit(1);
        }
    }
}

fn set_terminal(terminal: bool) {
    sl_core::print::set_config(LogConfig {
        terminal,
        file: false,
    });
}
