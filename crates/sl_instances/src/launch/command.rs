//! Assembling the final command line.
//!
//! [`game_options`] decides memory, extra JVM flags and identity
//! before the base command exists; [`build`] then augments the
//! base command. `build` is pure: same input, same output.

use std::path::{Path, PathBuf};

use sl_core::{err, settings::JavaMode, ELYBY_HOST, REDACT_SENSITIVE_INFO};

use super::{request::LaunchRequest, LaunchOptions};
use crate::session::Session;

pub const G1GC_FLAGS: &[&str] = &[
    "-XX:+UseG1GC",
    "-XX:+UnlockExperimentalVMOptions",
    "-XX:G1NewSizePercent=20",
    "-XX:G1ReservePercent=20",
    "-XX:MaxGCPauseMillis=50",
    "-XX:G1HeapRegionSize=16M",
];

pub const LEGACY_SSL_FLAG: &str = "-Djavax.net.ssl.trustStoreType=Windows-ROOT";

const CLASSPATH_FLAG: &str = "-cp";

/// What the base command is generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOptions {
    pub username: String,
    pub uuid: String,
    pub token: String,
    /// Go right after the java executable.
    pub jvm_arguments: Vec<String>,
    pub java_selection: JavaMode,
}

/// The assembled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub argv: Vec<String>,
    /// When set, run this through the platform shell instead of `argv`.
    pub shell: Option<String>,
}

#[must_use]
pub fn authlib_path(data_dir: &Path) -> PathBuf {
    data_dir.join("authlib-injector.jar")
}

/// Splits a user-typed argument string, logging (and
/// dropping) it if the quoting is broken.
fn split_user_args(raw: &str, what: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(raw) {
        Ok(n) => n,
        Err(error) => {
            err!("Ignoring {what} {raw:?}: {error}");
            Vec::new()
        }
    }
}

/// Memory flags, user JVM flags and the identity to launch with.
///
/// An online session (non-empty token) replaces the request's
/// name and adds the authlib-injector agent.
#[must_use]
pub fn game_options(
    request: &LaunchRequest,
    session: Option<&Session>,
    data_dir: &Path,
) -> GameOptions {
    let memory = request.options.memory_mb;
    let mut jvm_arguments = vec![
        format!("-Xmx{memory}M"),
        format!("-Xms{}M", (memory / 2).min(2048)),
    ];
    jvm_arguments.extend(split_user_args(
        &request.options.extra_jvm_args,
        "JVM arguments",
    ));

    let mut options = GameOptions {
        username: request.username.clone(),
        uuid: session.map_or_else(
            || uuid::Uuid::new_v4().to_string(),
            |n| n.uuid.clone(),
        ),
        token: String::new(),
        jvm_arguments,
        java_selection: request.options.java_selection,
    };

    if let Some(session) = session.filter(|n| n.is_online()) {
        options.jvm_arguments.push(format!(
            "-javaagent:{}={ELYBY_HOST}",
            authlib_path(data_dir).to_string_lossy()
        ));
        options.username.clone_from(&session.username);
        options.uuid.clone_from(&session.uuid);
        options.token.clone_from(&session.token);
    }
    options
}

/// Inserts `items` right before `-cp`, or at `fallback`
/// (clamped to the end) when there's no `-cp`.
fn insert_before_classpath(argv: &mut Vec<String>, items: &[&str], fallback: usize) {
    let index = argv
        .iter()
        .position(|n| n == CLASSPATH_FLAG)
        .unwrap_or_else(|| fallback.min(argv.len()));
    argv.splice(index..index, items.iter().map(|n| (*n).to_owned()));
}

/// Augments the base command with presets, the java override,
/// extra game arguments and the wrapper.
#[must_use]
pub fn build(base: Vec<String>, options: &LaunchOptions) -> LaunchCommand {
    let mut argv = base;

    if options.optimization_preset.uses_g1gc() {
        insert_before_classpath(&mut argv, G1GC_FLAGS, 2);
    }
    if options.update_legacy_ssl {
        insert_before_classpath(&mut argv, &[LEGACY_SSL_FLAG], 1);
    }

    let custom_java = options.custom_java_path.trim();
    if options.java_selection == JavaMode::Custom && !custom_java.is_empty() {
        if let Some(java) = argv.first_mut() {
            custom_java.clone_into(java);
        }
    }

    argv.extend(split_user_args(&options.extra_game_args, "game arguments"));

    let wrapper = options.wrapper_command.trim();
    let shell = (!wrapper.is_empty()).then(|| {
        let quoted = shell_words::join(&argv);
        if wrapper.contains("%command%") {
            wrapper.replace("%command%", &quoted)
        } else {
            format!("{wrapper} {quoted}")
        }
    });

    LaunchCommand { argv, shell }
}

const CENSORED_FLAGS: &[&str] = &["--accessToken", "--session", "--uuid", "--clientId", "--xuid"];

/// A copy of `argv` fit for logs.
///
/// Unless redaction is turned off, values of credential
/// flags and any argument containing one of `secrets` are
/// replaced with `[REDACTED]`.
#[must_use]
pub fn censor(argv: &[String], secrets: &[&str]) -> Vec<String> {
    let redact = REDACT_SENSITIVE_INFO
        .lock()
        .map(|n| *n)
        .unwrap_or(true);
    if !redact {
        return argv.to_vec();
    }

    let secrets: Vec<&str> = secrets.iter().copied().filter(|n| n.len() >= 3).collect();
    let mut out = argv.to_vec();
    for i in 0..out.len() {
        if CENSORED_FLAGS.contains(&argv[i].as_str()) {
            if let Some(value) = out.get_mut(i + 1) {
                "[REDACTED]".clone_into(value);
            }
        }
    }
    for arg in &mut out {
        for secret in &secrets {
            if arg.contains(secret) {
                *arg = arg.replace(secret, "[REDACTED]");
            }
        }
    }
    out
}

/// [`censor`] for a single shell string.
#[must_use]
pub fn censor_string(command: &str, secrets: &[&str]) -> String {
    let redact = REDACT_SENSITIVE_INFO
        .lock()
        .map(|n| *n)
        .unwrap_or(true);
    if !redact {
        return command.to_owned();
    }
    secrets
        .iter()
        .filter(|n| n.len() >= 3)
        .fold(command.to_owned(), |acc, secret| acc.replace(secret, "[REDACTED]"))
}
