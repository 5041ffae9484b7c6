use std::{
    io::{IsTerminal, Write},
    path::PathBuf,
    sync::Arc,
};

use owo_colors::OwoColorize;
use sl_core::{
    err, file_utils, info, HttpTransport, JsonSettingsStore, LauncherSettings, LoaderType,
    MirrorConfig, ProgressReporter, ReqwestTransport, SettingsStore,
};
use sl_instances::{
    session::{random_username, ElyByPasswordAuth},
    ArtifactInstaller, Credentials, LaunchOptions, LaunchOrchestrator, LaunchRequest, Session,
    SessionProvider, VersionCatalog,
};
use sl_mod_manager::{ModFiles, ModLoaderInstaller, ModpackContents};
use tokio_util::sync::CancellationToken;

use super::{progress::TerminalProgress, Failure, LaunchArgs, ModsCommand};

const PASSWORD_ENV: &str = "SL_PASSWORD";

/// Everything a command needs, loaded once per run.
pub struct Context {
    data_dir: PathBuf,
    transport: Arc<dyn HttpTransport>,
    store: Arc<JsonSettingsStore>,
    mirrors: MirrorConfig,
    verbose: bool,
}

impl Context {
    pub fn open(verbose: bool) -> Result<Self, Failure> {
        let data_dir = file_utils::get_launcher_dir()?;
        let store = Arc::new(JsonSettingsStore::open(&data_dir)?);
        let mirrors = MirrorConfig::load_or_default(&data_dir);
        Ok(Self {
            data_dir,
            transport: Arc::new(ReqwestTransport::default()),
            store,
            mirrors,
            verbose,
        })
    }

    fn settings(&self) -> LauncherSettings {
        LauncherSettings::from_store(self.store.as_ref())
    }

    fn catalog(&self) -> Arc<VersionCatalog> {
        Arc::new(VersionCatalog::new(self.transport.clone(), &self.data_dir))
    }

    fn installer(&self, catalog: &Arc<VersionCatalog>) -> Arc<ArtifactInstaller> {
        Arc::new(ArtifactInstaller::new(
            self.transport.clone(),
            catalog.clone(),
            &self.data_dir,
            self.mirrors.artifacts.clone(),
        ))
    }

    fn sessions(&self) -> SessionProvider {
        let store: Arc<dyn SettingsStore> = self.store.clone();
        SessionProvider::new(store, Arc::new(ElyByPasswordAuth::default()))
    }

    fn progress(&self) -> ProgressReporter {
        ProgressReporter::new(Arc::new(TerminalProgress::new(self.verbose)))
    }
}

pub async fn launch(ctx: &Context, args: LaunchArgs) -> Result<(), Failure> {
    let mut settings = ctx.settings();
    let session = ctx.sessions().current();

    let mut options = LaunchOptions::from_settings(&settings);
    if let Some(memory_mb) = args.memory_mb {
        options.memory_mb = memory_mb;
    }
    if let Some(jvm_args) = args.jvm_args {
        options.extra_jvm_args = jvm_args;
    }
    if let Some(game_args) = args.game_args {
        options.extra_game_args = game_args;
    }
    if let Some(wrapper) = args.wrapper {
        options.wrapper_command = wrapper;
    }

    let request = LaunchRequest {
        minecraft_version: args
            .version
            .unwrap_or_else(|| settings.last_version.clone()),
        loader: args.loader.unwrap_or(settings.last_loader),
        username: pick_username(args.username, session.as_ref(), &settings.last_username),
        close_on_launch: args.close_on_launch || settings.close_on_launch,
        options,
    };
    request.validate()?;

    settings.last_version.clone_from(&request.minecraft_version);
    settings.last_loader = request.loader;
    settings.last_username.clone_from(&request.username);
    settings.write_to(ctx.store.as_ref());
    if let Err(error) = ctx.store.flush() {
        err!("Couldn't save settings: {error}");
    }

    let catalog = ctx.catalog();
    let installer = ctx.installer(&catalog);
    let orchestrator = LaunchOrchestrator::new(ctx.transport.clone(), catalog, installer);
    let outcome = orchestrator
        .launch(&request, session.as_ref(), &ctx.progress())
        .await?;

    if outcome.close_launcher {
        return Ok(());
    }
    if let Some(mut child) = outcome.child {
        match child.wait().await {
            Ok(status) => info!("Game exited ({status})"),
            Err(error) => err!("Lost track of the game process: {error}"),
        }
    }
    Ok(())
}

/// An explicit name, then the logged-in account,
/// then the last one used, then a made-up one.
fn pick_username(explicit: Option<String>, session: Option<&Session>, last: &str) -> String {
    explicit
        .or_else(|| {
            session
                .filter(|n| n.is_online())
                .map(|n| n.username.clone())
        })
        .or_else(|| (!last.is_empty()).then(|| last.to_owned()))
        .unwrap_or_else(random_username)
}

pub async fn install_loader(
    ctx: &Context,
    loader: LoaderType,
    mc_version: String,
    loader_version: Option<String>,
) -> Result<(), Failure> {
    let catalog = ctx.catalog();
    let installer = ctx.installer(&catalog);
    let loaders = ModLoaderInstaller::new(
        ctx.transport.clone(),
        catalog,
        installer,
        ctx.mirrors.forge.clone(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            err!("Interrupted, stopping the install");
            on_interrupt.cancel();
        }
    });

    let message = loaders
        .install(
            loader,
            &mc_version,
            loader_version.as_deref(),
            &ctx.progress(),
            &cancel,
        )
        .await?;
    info!("{message}");
    Ok(())
}

pub async fn list_versions(ctx: &Context, snapshots: bool) -> Result<(), Failure> {
    let include_snapshots = snapshots || ctx.settings().show_snapshots;
    eprintln!("Listing downloadable versions...");
    let versions = ctx.catalog().list_versions(include_snapshots).await?;

    let mut stdout = std::io::stdout().lock();
    for version in versions {
        let written = if version.kind == "release" {
            writeln!(stdout, "{}", version.id)
        } else {
            writeln!(
                stdout,
                "{} {}",
                version.id,
                format!("({})", version.kind).bright_black()
            )
        };
        // Closed pipe (`| head`)
        if written.is_err() {
            break;
        }
    }
    Ok(())
}

pub async fn login(ctx: &Context, username: String) -> Result<(), Failure> {
    let password = read_password()?;
    let session = ctx
        .sessions()
        .authenticate(&Credentials::password(username, password))
        .await?;
    println!("Logged in as {}", session.username.bold());
    Ok(())
}

fn read_password() -> Result<String, Failure> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        _ = std::io::stderr().flush();
    }
    let mut line = String::new();
    stdin
        .read_line(&mut line)
        .map_err(|n| Failure::invalid(format!("couldn't read the password: {n}")))?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(Failure::invalid(format!(
            "no password given (pipe it into stdin or set {PASSWORD_ENV})"
        )));
    }
    Ok(password)
}

pub fn logout(ctx: &Context) -> Result<(), Failure> {
    ctx.sessions().logout()?;
    println!("Logged out");
    Ok(())
}

pub fn status(ctx: &Context) -> Result<(), Failure> {
    let settings = ctx.settings();
    let row = |name: &str, value: &dyn std::fmt::Display| {
        println!("{:<16} {value}", format!("{name}:").bold());
    };

    row("Data directory", &ctx.data_dir.display());
    match ctx.sessions().current() {
        Some(session) => row("Account", &format!("{} (Ely.by)", session.username)),
        None => row("Account", &"offline".bright_black()),
    }
    row("Last version", &display_or_none(&settings.last_version));
    row("Last loader", &settings.last_loader);
    row("Last username", &display_or_none(&settings.last_username));
    row("Memory", &format!("{} GB", settings.memory));
    row("Java", &format!("{:?}", settings.java_mode).to_lowercase());
    row("Close on launch", &settings.close_on_launch);
    let mirrors_file = ctx.data_dir.join(MirrorConfig::FILE_NAME);
    row(
        "Mirrors",
        &if mirrors_file.is_file() {
            mirrors_file.to_string_lossy().into_owned()
        } else {
            "built-in".to_owned()
        },
    );
    Ok(())
}

fn display_or_none(value: &str) -> String {
    if value.is_empty() {
        "(none)".to_owned()
    } else {
        value.to_owned()
    }
}


pub async fn mods(ctx: &Context, command: ModsCommand) -> Result<(), Failure> {
    let files = ModFiles::new(&ctx.data_dir);
    match command {
        ModsCommand::List { mc_version } => {
            let mods = files.mods(&mc_version).await?;
            if mods.is_empty() {
                eprintln!("No mods for {mc_version}");
            }
            for name in mods {
                println!("{name}");
            }
        }
        ModsCommand::Add { mc_version, files: sources } => {
            for source in sources {
                let dest = files.add_mod(&mc_version, &source).await?;
                println!("Added {}", dest.display());
            }
        }
        ModsCommand::Remove { mc_version, name } => {
            files.remove_mod(&mc_version, &name).await?;
            println!("Removed {name}");
        }
        ModsCommand::Packs => {
            println!("{}", "Resource packs:".bold());
            for name in files.resource_packs().await? {
                println!("  {name}");
            }
            println!("{}", "Shader packs:".bold());
            for name in files.shader_packs().await? {
                println!("  {name}");
            }
        }
        ModsCommand::Pack {
            mc_version,
            output,
            mods,
            resource_packs,
            shader_packs,
        } => {
            let mods = if mods.is_empty() {
                files.mods(&mc_version).await?
            } else {
                mods
            };
            let contents = ModpackContents {
                mods,
                resource_packs,
                shader_packs,
            };
            let written = files.create_modpack(&mc_version, &contents, &output).await?;
            info!("Wrote {} ({written} files)", output.display());
        }
    }
    Ok(())
}
