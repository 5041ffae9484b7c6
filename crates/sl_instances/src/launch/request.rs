use sl_core::{
    settings::{JavaMode, JvmPreset},
    LauncherSettings, LoaderType,
};

use super::LaunchError;

/// Knobs that shape the game command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub memory_mb: i64,
    /// Shell-quoted, split before use.
    pub extra_jvm_args: String,
    /// Shell-quoted, appended at the very end.
    pub extra_game_args: String,
    /// Empty for none. `%command%` is replaced by the
    /// quoted command; otherwise the wrapper is a prefix.
    pub wrapper_command: String,
    pub java_selection: JavaMode,
    pub custom_java_path: String,
    pub optimization_preset: JvmPreset,
    pub update_legacy_ssl: bool,
}

impl LaunchOptions {
    #[must_use]
    pub fn from_settings(settings: &LauncherSettings) -> Self {
        Self {
            memory_mb: settings.memory_mb(),
            extra_jvm_args: settings.jre_args.clone(),
            extra_game_args: settings.mc_args.clone(),
            wrapper_command: settings.wrapper_cmd.clone(),
            java_selection: settings.java_mode,
            custom_java_path: settings.java_path.clone(),
            optimization_preset: settings.jre_optimized_profile,
            update_legacy_ssl: settings.update_legacy_ssl,
        }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from_settings(&LauncherSettings::default())
    }
}

/// One launch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub username: String,
    pub close_on_launch: bool,
    pub options: LaunchOptions,
}

impl LaunchRequest {
    /// Rejects requests that can't possibly launch.
    /// Does no I/O.
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.username.trim().is_empty() {
            return Err(LaunchError::InvalidRequest("username is empty".to_owned()));
        }
        if self.username.contains(char::is_whitespace) {
            return Err(LaunchError::InvalidRequest(
                "username can't contain spaces".to_owned(),
            ));
        }
        if self.minecraft_version.trim().is_empty() {
            return Err(LaunchError::InvalidRequest(
                "no Minecraft version selected".to_owned(),
            ));
        }
        if self.options.memory_mb <= 0 {
            return Err(LaunchError::InvalidRequest(format!(
                "memory must be positive (got {} MB)",
                self.options.memory_mb
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::ErrorKind;

    fn request() -> LaunchRequest {
        LaunchRequest {
            minecraft_version: "1.20.1".to_owned(),
            loader: LoaderType::Vanilla,
            username: "Steve".to_owned(),
            close_on_launch: false,
            options: LaunchOptions::default(),
        }
    }

    #[test]
    fn defaults_come_from_settings() {
        let options = LaunchOptions::default();
        assert_eq!(options.memory_mb, 4096);
        assert_eq!(options.optimization_preset, JvmPreset::Auto);
        assert_eq!(options.java_selection, JavaMode::Recommended);
        assert!(request().validate().is_ok());
    }

    #[test]
    fn bad_requests_are_rejected() {
        let mut empty = request();
        empty.username = "  ".to_owned();
        let mut spaced = request();
        spaced.username = "Steve Jobs".to_owned();
        let mut no_memory = request();
        no_memory.options.memory_mb = 0;

        for bad in [empty, spaced, no_memory] {
            assert_eq!(bad.validate().unwrap_err().kind(), ErrorKind::InvalidRequest);
        }
    }
}
