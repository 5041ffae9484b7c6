use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use sl_core::{
    err, logger_finish, ErrorKind, IoError, JsonFileError, LoaderType, LAUNCHER_NAME,
    LAUNCHER_VERSION_NAME, REDACT_SENSITIVE_INFO,
};
use sl_instances::{AuthError, CatalogError, LaunchError};
use sl_mod_manager::{LoaderInstallError, ModFileError};
use thiserror::Error;

mod command;
mod progress;

#[derive(Parser)]
#[cfg_attr(target_os = "windows", command(name = ".\\sixteen_launcher.exe"))]
#[cfg_attr(not(target_os = "windows"), command(name = "./sixteen_launcher"))]
#[command(version = LAUNCHER_VERSION_NAME)]
#[command(about = "A headless Minecraft launcher")]
struct Cli {
    #[clap(subcommand)]
    command: Option<SlSubCommand>,
    #[arg(long, global = true)]
    #[arg(help = "Don't censor tokens and usernames in the logged game command")]
    no_redact_info: bool,
    #[arg(short, long, global = true)]
    #[arg(help = "Print every progress log line")]
    verbose: bool,
}

#[derive(Subcommand)]
enum SlSubCommand {
    #[command(about = "Installs (if needed) and launches Minecraft")]
    Launch(LaunchArgs),
    #[command(about = "Installs Forge, Fabric, Quilt or OptiFine for a version")]
    InstallLoader {
        #[arg(long)]
        #[arg(help = "forge, fabric, quilt or optifine (case-insensitive)")]
        loader: LoaderType,
        #[arg(long)]
        mc_version: String,
        #[arg(long)]
        #[arg(help = "A specific loader build instead of the newest one")]
        loader_version: Option<String>,
    },
    #[command(about = "Lists downloadable versions", short_flag = 'a')]
    ListVersions {
        #[arg(long)]
        snapshots: bool,
    },
    #[command(about = "Logs in with an Ely.by account")]
    #[command(long_about = r"Logs in with an Ely.by account

The password is read from the SL_PASSWORD environment variable
if set, otherwise from stdin")]
    Login {
        #[arg(long)]
        username: String,
    },
    #[command(about = "Forgets the logged-in account")]
    Logout,
    #[command(about = "Shows the data directory, account and saved defaults")]
    Status,
    #[command(about = "Manages mod, resource pack and shader pack files")]
    Mods {
        #[clap(subcommand)]
        command: ModsCommand,
    },
}

#[derive(Subcommand)]
enum ModsCommand {
    #[command(about = "Lists the mods a version loads")]
    List { mc_version: String },
    #[command(about = "Copies mod files into a version's mods folder")]
    Add {
        mc_version: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    #[command(about = "Deletes a mod by file name")]
    Remove { mc_version: String, name: String },
    #[command(about = "Lists resource packs and shader packs")]
    Packs,
    #[command(about = "Bundles mods and packs into a modpack zip")]
    Pack {
        mc_version: String,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long = "mod")]
        #[arg(help = "Mod file name, repeatable (default: every mod of the version)")]
        mods: Vec<String>,
        #[arg(long = "resource-pack")]
        resource_packs: Vec<String>,
        #[arg(long = "shader-pack")]
        shader_packs: Vec<String>,
    },
}

/// Flags left out fall back to the saved settings.
#[derive(Args, Debug, Default)]
struct LaunchArgs {
    #[arg(long)]
    version: Option<String>,
    #[arg(long)]
    #[arg(help = "vanilla, forge, fabric, quilt or optifine (case-insensitive)")]
    loader: Option<LoaderType>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    memory_mb: Option<i64>,
    #[arg(long)]
    #[arg(help = "Exit as soon as the game has started")]
    close_on_launch: bool,
    #[arg(long, allow_hyphen_values = true)]
    jvm_args: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    game_args: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    #[arg(help = "Wrapper command, `%command%` is replaced with the game command")]
    wrapper: Option<String>,
}

/// Why a command failed, and how to report it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
        }
    }
}

macro_rules! impl_failure_from {
    ($($error:ty),*) => {
        $(impl From<$error> for Failure {
            fn from(error: $error) -> Self {
                Self {
                    kind: error.kind(),
                    message: error.to_string(),
                }
            }
        })*
    };
}

impl_failure_from!(
    LaunchError,
    LoaderInstallError,
    CatalogError,
    AuthError,
    ModFileError
);

impl From<IoError> for Failure {
    fn from(error: IoError) -> Self {
        Self {
            kind: ErrorKind::DiskWriteError,
            message: error.to_string(),
        }
    }
}

impl From<JsonFileError> for Failure {
    fn from(error: JsonFileError) -> Self {
        Self {
            kind: ErrorKind::DiskWriteError,
            message: error.to_string(),
        }
    }
}

fn print_intro() {
    println!(
        " {} {}\n {}\n\n For a list of commands type\n {}",
        LAUNCHER_NAME.purple().bold(),
        LAUNCHER_VERSION_NAME.purple(),
        "A headless Minecraft launcher".green().bold(),
        "./sixteen_launcher --help".yellow()
    );
}

pub fn start_cli() {
    let cli = Cli::parse();
    if let Ok(mut redact) = REDACT_SENSITIVE_INFO.lock() {
        *redact = !cli.no_redact_info;
    }
    let Some(subcommand) = cli.command else {
        print_intro();
        return;
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(n) => n,
        Err(error) => {
            err!("Couldn't start the async runtime: {error}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        let ctx = command::Context::open(cli.verbose)?;
        match subcommand {
            SlSubCommand::Launch(args) => command::launch(&ctx, args).await,
            SlSubCommand::InstallLoader {
                loader,
                mc_version,
                loader_version,
            } => command::install_loader(&ctx, loader, mc_version, loader_version).await,
            SlSubCommand::ListVersions { snapshots } => {
                command::list_versions(&ctx, snapshots).await
            }
            SlSubCommand::Login { username } => command::login(&ctx, username).await,
            SlSubCommand::Logout => command::logout(&ctx),
            SlSubCommand::Status => command::status(&ctx),
            SlSubCommand::Mods { command } => command::mods(&ctx, command).await,
        }
    });
    quit(result);
}

fn quit(result: Result<(), Failure>) -> ! {
    let code = match result {
        Ok(()) => 0,
        Err(failure) => {
            err!("{}", failure.message);
            eprintln!("error-kind: {}", failure.kind);
            failure.kind.exit_code()
        }
    };
    logger_finish();
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sixteen_launcher").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn launch_flags() {
        let cli = parse(&[
            "launch",
            "--version",
            "1.20.1",
            "--loader",
            "Fabric",
            "--memory-mb",
            "6144",
            "--jvm-args",
            "-XX:+UseZGC -Dfoo=bar",
            "--close-on-launch",
            "--no-redact-info",
        ]);
        assert!(cli.no_redact_info);
        let Some(SlSubCommand::Launch(args)) = cli.command else {
            panic!("not a launch");
        };
        assert_eq!(args.version.as_deref(), Some("1.20.1"));
        assert_eq!(args.loader, Some(LoaderType::Fabric));
        assert_eq!(args.memory_mb, Some(6144));
        assert_eq!(args.jvm_args.as_deref(), Some("-XX:+UseZGC -Dfoo=bar"));
        assert!(args.close_on_launch);
        assert!(args.username.is_none());
    }

    #[test]
    fn unknown_loaders_are_rejected() {
        let result = Cli::try_parse_from([
            "sixteen_launcher",
            "install-loader",
            "--loader",
            "neoforge",
            "--mc-version",
            "1.20.1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn modpack_flags_repeat() {
        let cli = parse(&[
            "mods",
            "pack",
            "1.20.1",
            "-o",
            "pack.zip",
            "--mod",
            "sodium.jar",
            "--mod",
            "lithium.jar",
            "--shader-pack",
            "BSL.zip",
        ]);
        let Some(SlSubCommand::Mods {
            command:
                ModsCommand::Pack {
                    mc_version,
                    output,
                    mods,
                    resource_packs,
                    shader_packs,
                },
        }) = cli.command
        else {
            panic!("not mods pack");
        };
        assert_eq!(mc_version, "1.20.1");
        assert_eq!(output, PathBuf::from("pack.zip"));
        assert_eq!(mods, ["sodium.jar", "lithium.jar"]);
        assert!(resource_packs.is_empty());
        assert_eq!(shader_packs, ["BSL.zip"]);
    }

    #[test]
    fn mods_add_needs_a_file() {
        let result = Cli::try_parse_from(["sixteen_launcher", "mods", "add", "1.20.1"]);
        assert!(result.is_err());
    }

    #[test]
    fn failures_keep_the_error_kind() {
        let failure = Failure::from(LaunchError::InvalidRequest("username is empty".to_owned()));
        assert_eq!(failure.kind, ErrorKind::InvalidRequest);
        assert_eq!(failure.kind.exit_code(), 2);
        assert!(failure.message.contains("username is empty"));
    }
}
