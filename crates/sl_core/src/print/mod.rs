use std::{
    fmt::Display,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    sync::{LazyLock, RwLock},
};

use regex::Regex;

use crate::{eeprintln, file_utils};

pub mod macros;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogType {
    Info,
    Error,
    Point,
}

impl Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogType::Info => "[info]",
                LogType::Error => "[error]",
                LogType::Point => "-",
            }
        )
    }
}

pub struct LogConfig {
    pub terminal: bool,
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            terminal: true,
            file: true,
        }
    }
}

/// Background log-file writer.
///
/// The first logged line lazily opens
/// `<dataDir>/logs/<timestamp>.log` and starts a writer
/// thread; later lines are handed over through a channel
/// so logging never blocks on disk.
#[derive(Default)]
pub struct LoggingState {
    thread: Option<std::thread::JoinHandle<()>>,
    writer: Option<BufWriter<File>>,
    sender: Option<std::sync::mpsc::Sender<(String, LogType)>>,
    config: LogConfig,
}

impl LoggingState {
    #[must_use]
    pub fn create() -> Option<RwLock<LoggingState>> {
        Some(RwLock::new(Self::default()))
    }

    pub fn write_to_logfile(&mut self, s: &str, t: LogType) {
        if !self.config.file {
            return;
        }

        if self.sender.is_none() {
            let (sender, receiver) = std::sync::mpsc::channel::<(String, LogType)>();

            if self.writer.is_none() {
                if let Some(file) = get_logs_file() {
                    self.writer = Some(BufWriter::new(file));
                }
            }

            if let Some(writer) = self.writer.take() {
                let thread = std::thread::spawn(move || {
                    let mut writer = writer;

                    while let Ok((msg, t)) = receiver.recv() {
                        let time = chrono::Local::now().format("%H:%M:%S");
                        _ = writeln!(writer, "[{time}] {t} {msg}");
                        _ = writer.flush();
                    }
                });
                self.thread = Some(thread);
            }

            self.sender = Some(sender);
        }

        if let Some(sender) = &self.sender {
            _ = sender.send((s.to_owned(), t));
        }
    }

    pub fn finish(&mut self) {
        // Dropping the sender ends the writer loop.
        self.sender = None;
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}

pub fn set_config(c: LogConfig) {
    if let Some(l) = &*LOGGER {
        if let Ok(mut l) = l.write() {
            l.config = c;
        }
    }
}

fn get_logs_file() -> Option<File> {
    let logs_dir = file_utils::get_launcher_dir().ok()?.join("logs");
    std::fs::create_dir_all(&logs_dir).ok()?;
    let log_file_name = format!("{}.log", chrono::Local::now().format("%Y-%m-%d-%H-%M-%S"));
    let log_file_path = logs_dir.join(log_file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .ok()
}

pub static LOGGER: LazyLock<Option<RwLock<LoggingState>>> = LazyLock::new(LoggingState::create);

pub fn print_to_file(msg: &str, t: LogType) {
    if let Some(logger) = LOGGER.as_ref() {
        if let Ok(mut lock) = logger.write() {
            lock.write_to_logfile(&strip_ansi_codes(msg), t);
        } else {
            eeprintln!("sl_core::print::print_to_file(): Logger thread panicked!\n[msg]: {msg}");
        }
    }
}

pub fn logger_finish() {
    if let Some(logger) = LOGGER.as_ref() {
        if let Ok(mut lock) = logger.write() {
            lock.finish();
        } else {
            eeprintln!("sl_core::print::logger_finish(): Logger thread panicked!");
        }
    }
}

#[must_use]
pub fn is_print() -> bool {
    LOGGER
        .as_ref()
        .and_then(|l| l.read().ok().map(|l| l.config.terminal))
        .unwrap_or(true)
}

/// Regex: ESC [ ... letters
static ANSI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-9;]*[A-Za-z]").expect("valid regex"));

/// Removes ANSI escape codes (colors, formatting, cursor moves) from a string.
pub fn strip_ansi_codes(input: &str) -> String {
    ANSI_REGEX.replace_all(input, "").to_string()
}

/// Used to fix a super annoying bug
pub static IS_GIT_BASH: LazyLock<bool> = LazyLock::new(|| {
    if cfg!(target_os = "windows") {
        std::env::var_os("MSYSTEM").is_some()
            || std::env::var_os("MSYS").is_some()
            || std::env::var_os("MINGW_PREFIX").is_some()
    } else {
        false
    }
});
