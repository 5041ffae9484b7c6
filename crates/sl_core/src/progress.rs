use std::{
    fmt::Display,
    sync::{mpsc::Sender, Arc, Mutex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// A new step started; `text` names it.
    Status,
    /// `current` out of `total` done.
    Progress,
    /// A line of diagnostic output.
    Log,
    /// `current == 1` when the operation starts running,
    /// `current == 0` once it stops (whatever the outcome).
    StateChanged,
    /// Terminal failure; `text` is the human-readable message.
    Error,
    /// Terminal success; `text` is the result message.
    Completed,
}

/// One event on an operation's ordered output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub current: usize,
    pub total: usize,
    pub text: String,
}

impl ProgressEvent {
    #[must_use]
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Status,
            current: 0,
            total: 0,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn progress(current: usize, total: usize, text: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Progress,
            current,
            total,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn log(text: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Log,
            current: 0,
            total: 0,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn state_changed(running: bool) -> Self {
        Self {
            kind: ProgressKind::StateChanged,
            current: usize::from(running),
            total: 1,
            text: String::new(),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ProgressKind::Error | ProgressKind::Completed)
    }
}

impl Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ProgressKind::Progress => write!(f, "({}/{}) {}", self.current, self.total, self.text),
            ProgressKind::StateChanged => {
                write!(f, "running: {}", self.current == 1)
            }
            _ => write!(f, "{}", self.text),
        }
    }
}

/// Consumes the event stream of one operation.
pub trait ProgressSink: Send + Sync {
    fn send(&self, event: ProgressEvent);
}

impl ProgressSink for Sender<ProgressEvent> {
    fn send(&self, event: ProgressEvent) {
        // The receiver hanging up just means nobody is watching.
        _ = Sender::send(self, event);
    }
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<ProgressEvent> {
    fn send(&self, event: ProgressEvent) {
        _ = tokio::sync::mpsc::UnboundedSender::send(self, event);
    }
}

/// A sink that keeps every event, for inspection afterwards.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|n| n.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, kind: ProgressKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl ProgressSink for EventLog {
    fn send(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Emits the events of one operation, guarding the
/// terminal part of the stream.
///
/// However an operation ends, [`ProgressReporter::finish_ok`]
/// or [`ProgressReporter::finish_err`] only ever emits the
/// terminal event and `stateChanged(false)` once; later calls
/// are ignored.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn ProgressSink>>,
    finished: Arc<std::sync::atomic::AtomicBool>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink: Some(sink),
            finished: Arc::default(),
        }
    }

    /// A reporter that drops everything.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            sink: None,
            finished: Arc::default(),
        }
    }

    pub fn send(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink.send(event);
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.send(ProgressEvent::status(text));
    }

    pub fn progress(&self, current: usize, total: usize, text: impl Into<String>) {
        self.send(ProgressEvent::progress(current, total, text));
    }

    pub fn log(&self, text: impl Into<String>) {
        self.send(ProgressEvent::log(text));
    }

    pub fn started(&self) {
        self.send(ProgressEvent::state_changed(true));
    }

    fn claim_finish(&self) -> bool {
        !self.finished.swap(true, std::sync::atomic::Ordering::SeqCst)
    }

    pub fn finish_ok(&self, message: impl Into<String>) {
        if self.claim_finish() {
            self.send(ProgressEvent {
                kind: ProgressKind::Completed,
                current: 1,
                total: 1,
                text: message.into(),
            });
            self.send(ProgressEvent::state_changed(false));
        }
    }

    pub fn finish_err(&self, message: impl Into<String>) {
        if self.claim_finish() {
            self.send(ProgressEvent {
                kind: ProgressKind::Error,
                current: 0,
                total: 0,
                text: message.into(),
            });
            self.send(ProgressEvent::state_changed(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events_are_emitted_once() {
        let log = EventLog::new();
        let reporter = ProgressReporter::new(Arc::new(log.clone()));
        reporter.started();
        reporter.status("working");
        reporter.finish_err("boom");
        reporter.finish_ok("late");
        reporter.finish_err("again");

        let events = log.events();
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == ProgressEvent::state_changed(false))
                .count(),
            1
        );
        assert_eq!(events.last(), Some(&ProgressEvent::state_changed(false)));
    }

    #[test]
    fn channel_sink_keeps_order() {
        let (sender, receiver) = std::sync::mpsc::channel();
        let reporter = ProgressReporter::new(Arc::new(sender));
        reporter.status("a");
        reporter.progress(1, 2, "b");
        reporter.log("c");
        drop(reporter);

        let texts: Vec<_> = receiver.iter().map(|e| e.text).collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }
}
