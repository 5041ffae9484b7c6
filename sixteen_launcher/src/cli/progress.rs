use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use sl_core::{ProgressEvent, ProgressKind, ProgressSink};

const SPINNER_TEMPLATE: &str = "{spinner:.green} {wide_msg}";
const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}";

/// Draws one operation's events as a terminal spinner,
/// switching to a bar once counts show up.
pub struct TerminalProgress {
    bar: ProgressBar,
    counting: AtomicBool,
    show_logs: bool,
}

impl TerminalProgress {
    pub fn new(show_logs: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(style(SPINNER_TEMPLATE));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            counting: AtomicBool::new(false),
            show_logs,
        }
    }

    fn set_counting(&self, counting: bool) {
        if self.counting.swap(counting, Ordering::SeqCst) != counting {
            self.bar.set_style(style(if counting {
                BAR_TEMPLATE
            } else {
                SPINNER_TEMPLATE
            }));
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl ProgressSink for TerminalProgress {
    fn send(&self, event: ProgressEvent) {
        match event.kind {
            ProgressKind::Status => {
                self.set_counting(false);
                self.bar.set_message(event.text);
            }
            ProgressKind::Progress => {
                self.set_counting(true);
                self.bar.set_length(event.total as u64);
                self.bar.set_position(event.current as u64);
                self.bar.set_message(event.text);
            }
            ProgressKind::Log => {
                if self.show_logs {
                    self.bar.println(event.text.bright_black().to_string());
                }
            }
            ProgressKind::StateChanged => {
                if event.current == 0 {
                    self.bar.finish_and_clear();
                }
            }
            ProgressKind::Completed => {
                self.bar.finish_and_clear();
                eprintln!("{} {}", "Done:".green().bold(), event.text);
            }
            // Reported by the caller along with the error kind.
            ProgressKind::Error => self.bar.finish_and_clear(),
        }
    }
}
