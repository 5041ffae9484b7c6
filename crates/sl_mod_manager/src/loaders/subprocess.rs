//! Running installer processes with their output streamed
//! line by line.
//!
//! Two separate limits apply: `total` (wall clock since
//! spawn) and `inactivity` (time since the last line on
//! either stream). Hitting either kills the process.

use std::{
    fmt::Display,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use sl_core::no_window;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

/// Lines kept for error messages.
const TAIL_LINES: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub total: Duration,
    pub inactivity: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Total(Duration),
    Inactivity(Duration),
}

impl Display for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeout::Total(n) => write!(f, "still running after {}s", n.as_secs()),
            Timeout::Inactivity(n) => write!(f, "no output for {}s", n.as_secs()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// `None` if the process was killed by a signal.
    Exited(Option<i32>),
    TimedOut(Timeout),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub end: RunEnd,
    /// Every line printed, stdout and stderr interleaved
    /// in arrival order.
    pub lines: Vec<String>,
}

impl RunOutput {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.end == RunEnd::Exited(Some(0))
    }

    /// The last few lines, for error messages.
    #[must_use]
    pub fn tail(&self) -> String {
        let start = self.lines.len().saturating_sub(TAIL_LINES);
        self.lines[start..].join("\n")
    }
}

enum Step {
    Line(Option<Vec<u8>>, bool),
    Exited(ExitStatus),
    Stop(RunEnd),
}

/// Runs `program args` in `cwd`, calling `on_line` for every
/// output line as it arrives.
///
/// # Errors
/// Only if the process can't be started or waited on.
/// A non-zero exit, a timeout or cancellation come back
/// in [`RunOutput::end`].
pub async fn run_streaming(
    program: &str,
    args: &[String],
    cwd: &Path,
    limits: RunLimits,
    cancel: &CancellationToken,
    mut on_line: impl FnMut(&str),
) -> std::io::Result<RunOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    no_window!(command);

    let mut child = command.spawn()?;
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(std::io::Error::other("child output wasn't captured"));
    };
    let mut stdout = BufReader::new(stdout).split(b'\n');
    let mut stderr = BufReader::new(stderr).split(b'\n');

    let total_deadline = Instant::now() + limits.total;
    let mut last_output = Instant::now();
    let (mut stdout_open, mut stderr_open) = (true, true);
    let mut lines = Vec::new();

    let end = loop {
        let step = tokio::select! {
            line = stdout.next_segment(), if stdout_open => Step::Line(line?, false),
            line = stderr.next_segment(), if stderr_open => Step::Line(line?, true),
            status = child.wait(), if !stdout_open && !stderr_open => Step::Exited(status?),
            () = tokio::time::sleep_until(last_output + limits.inactivity) => {
                Step::Stop(RunEnd::TimedOut(Timeout::Inactivity(limits.inactivity)))
            }
            () = tokio::time::sleep_until(total_deadline) => {
                Step::Stop(RunEnd::TimedOut(Timeout::Total(limits.total)))
            }
            () = cancel.cancelled() => Step::Stop(RunEnd::Cancelled),
        };

        match step {
            Step::Line(Some(raw), _) => {
                last_output = Instant::now();
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches('\r');
                on_line(line);
                lines.push(line.to_owned());
            }
            Step::Line(None, true) => stderr_open = false,
            Step::Line(None, false) => stdout_open = false,
            Step::Exited(status) => break RunEnd::Exited(status.code()),
            Step::Stop(end) => {
                _ = child.kill().await;
                break end;
            }
        }
    };

    Ok(RunOutput { end, lines })
}
