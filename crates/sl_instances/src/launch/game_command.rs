use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use sl_core::{
    json::{version::flatten_arguments, VersionDetails},
    settings::JavaMode,
    CLASSPATH_SEPARATOR, LAUNCHER_NAME, LAUNCHER_VERSION_NAME,
};

use super::{command::GameOptions, LaunchError};
use crate::install::natives_dir;

/// Produces the base command (java, JVM flags, classpath,
/// main class, game arguments) for an installed version.
pub trait GameCommandCollaborator: Send + Sync {
    fn base_command(
        &self,
        version_id: &str,
        options: &GameOptions,
    ) -> Result<Vec<String>, LaunchError>;
}

/// Builds the base command from `versions/<id>/<id>.json`,
/// the same way the vanilla launcher does.
pub struct VersionJsonCommand {
    data_dir: PathBuf,
}

impl VersionJsonCommand {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The runtime under `<dataDir>/runtime/<component>` when
    /// one was installed, else `java` from PATH.
    fn java_program(&self, details: &VersionDetails, selection: JavaMode) -> String {
        if selection == JavaMode::Recommended {
            if let Some(java) = details.javaVersion.as_ref().and_then(|n| {
                sl_java_handler::java_binary(&self.data_dir.join("runtime").join(&n.component))
            }) {
                return java.to_string_lossy().into_owned();
            }
        }
        "java".to_owned()
    }

    fn classpath(&self, details: &VersionDetails) -> String {
        let libraries_dir = self.data_dir.join("libraries");
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        // Loader profiles come first in the merged list,
        // so their copy of a shared library wins.
        for library in details.libraries.iter().filter(|n| n.is_allowed()) {
            let Some(artifact) = library.get_artifact() else {
                continue;
            };
            if let Some(key) = library.name.as_deref().map(library_key) {
                if !seen.insert(key) {
                    continue;
                }
            }
            entries.push(libraries_dir.join(artifact.get_path()));
        }

        let jar_id = details.get_jar_id();
        entries.push(VersionDetails::jar_path(&self.data_dir.join("versions"), jar_id));

        let separator = CLASSPATH_SEPARATOR.to_string();
        entries
            .iter()
            .map(|n| n.to_string_lossy())
            .collect::<Vec<_>>()
            .join(separator.as_str())
    }
}

/// `group:artifact:version[:classifier]` without the version.
fn library_key(name: &str) -> String {
    let mut parts: Vec<&str> = name.split(':').collect();
    if parts.len() >= 3 {
        parts.remove(2);
    }
    parts.join(":")
}

/// JVM flags for versions that predate the `arguments` field.
const LEGACY_JVM_ARGS: &[&str] = &[
    "-Djava.library.path=${natives_directory}",
    "-Dminecraft.launcher.brand=${launcher_name}",
    "-Dminecraft.launcher.version=${launcher_version}",
    "-cp",
    "${classpath}",
];

fn replace_vars(arg: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = arg.to_owned();
    for (key, value) in vars {
        let pattern = format!("${{{key}}}");
        if out.contains(&pattern) {
            out = out.replace(&pattern, value);
        }
    }
    out
}

impl GameCommandCollaborator for VersionJsonCommand {
    fn base_command(
        &self,
        version_id: &str,
        options: &GameOptions,
    ) -> Result<Vec<String>, LaunchError> {
        let versions_dir = self.data_dir.join("versions");
        let details = VersionDetails::load_merged_s(&versions_dir, version_id)
            .map_err(LaunchError::VersionFiles)?;
        let main_class = details
            .mainClass
            .clone()
            .ok_or_else(|| LaunchError::NoMainClass(version_id.to_owned()))?;

        let path = |p: &Path| p.to_string_lossy().into_owned();
        let assets_dir = self.data_dir.join("assets");
        let assets_id = details.get_assets_id().unwrap_or("legacy").to_owned();

        let vars: HashMap<&str, String> = HashMap::from([
            (
                "natives_directory",
                path(&natives_dir(&versions_dir, details.get_jar_id())),
            ),
            ("launcher_name", LAUNCHER_NAME.to_owned()),
            ("launcher_version", LAUNCHER_VERSION_NAME.to_owned()),
            ("classpath", self.classpath(&details)),
            ("classpath_separator", CLASSPATH_SEPARATOR.to_string()),
            ("library_directory", path(&self.data_dir.join("libraries"))),
            ("version_name", details.id.clone()),
            ("game_directory", path(&self.data_dir)),
            ("assets_root", path(&assets_dir)),
            (
                "game_assets",
                path(&assets_dir.join("virtual").join(&assets_id)),
            ),
            ("assets_index_name", assets_id),
            ("auth_player_name", options.username.clone()),
            ("auth_uuid", options.uuid.clone()),
            ("auth_access_token", options.token.clone()),
            ("auth_session", options.token.clone()),
            ("auth_xuid", String::new()),
            ("clientid", String::new()),
            ("user_type", "mojang".to_owned()),
            ("user_properties", "{}".to_owned()),
            (
                "version_type",
                details.r#type.clone().unwrap_or_else(|| "release".to_owned()),
            ),
        ]);

        let (jvm_args, game_args): (Vec<String>, Vec<String>) = match &details.arguments {
            Some(arguments) => (
                flatten_arguments(&arguments.jvm),
                flatten_arguments(&arguments.game),
            ),
            None => (
                LEGACY_JVM_ARGS.iter().map(|n| (*n).to_owned()).collect(),
                details
                    .minecraftArguments
                    .as_deref()
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect(),
            ),
        };
        // Some loader profiles carry `arguments.game` only.
        let jvm_args = if jvm_args.iter().any(|n| n == "-cp" || n == "${classpath}") {
            jvm_args
        } else {
            jvm_args
                .into_iter()
                .chain(LEGACY_JVM_ARGS.iter().map(|n| (*n).to_owned()))
                .collect()
        };

        let mut argv = vec![self.java_program(&details, options.java_selection)];
        argv.extend(options.jvm_arguments.iter().cloned());
        argv.extend(jvm_args.iter().map(|n| replace_vars(n, &vars)));
        argv.push(main_class);
        argv.extend(game_args.iter().map(|n| replace_vars(n, &vars)));
        Ok(argv)
    }
}
