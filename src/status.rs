//! Operator-facing status lines.
//!
//! The orchestrator emits [`StatusEvent`]s; a [`StatusSink`] decides how they
//! look. Presentation never flows back into results.

use std::io::Write;
use std::sync::Mutex;

use crate::package::PackageId;
use crate::runner::RunOutcome;

/// Kind of status notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Failure,
}

impl StatusKind {
    fn ansi(self) -> &'static str {
        match self {
            StatusKind::Info => "\x1b[94m",
            StatusKind::Success => "\x1b[92m",
            StatusKind::Failure => "\x1b[91m",
        }
    }

    fn label(self) -> &'static str {
        match self {
            StatusKind::Info => "INFO",
            StatusKind::Success => "PASS",
            StatusKind::Failure => "FAIL",
        }
    }
}

/// A start or finish notice for one package under one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Started {
        package: PackageId,
        profile: String,
    },
    Finished {
        package: PackageId,
        profile: String,
        outcome: RunOutcome,
    },
}

impl StatusEvent {
    /// Classifies the event.
    pub fn kind(&self) -> StatusKind {
        match self {
            StatusEvent::Started { .. } => StatusKind::Info,
            StatusEvent::Finished { outcome, .. } if outcome.is_success() => StatusKind::Success,
            StatusEvent::Finished { .. } => StatusKind::Failure,
        }
    }

    /// Plain message text without styling.
    pub fn message(&self) -> String {
        match self {
            StatusEvent::Started { package, profile } => {
                format!("testing {} against {}", package, profile)
            }
            StatusEvent::Finished {
                package,
                profile,
                outcome,
            } => format!("{} against {}: {}", package, profile, outcome),
        }
    }
}

/// Receives status events from the orchestrator. Must tolerate concurrent calls.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: &StatusEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn emit(&self, _event: &StatusEvent) {}
}

/// Writes one line per event to a writer, optionally coloured.
pub struct ConsoleSink<W: Write + Send> {
    writer: Mutex<W>,
    color: bool,
}

impl ConsoleSink<std::io::Stderr> {
    /// Writes to stderr. Colour is disabled when `NO_COLOR` is set.
    pub fn stderr(color: bool) -> Self {
        let color = color && std::env::var_os("NO_COLOR").is_none();
        Self::new(std::io::stderr(), color)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Creates a sink over any writer.
    pub fn new(writer: W, color: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            color,
        }
    }

    /// Formats an event as a single line.
    pub fn format(&self, event: &StatusEvent) -> String {
        let kind = event.kind();
        if self.color {
            format!("{}{}\x1b[0m {}", kind.ansi(), kind.label(), event.message())
        } else {
            format!("[{}] {}", kind.label(), event.message())
        }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> StatusSink for ConsoleSink<W> {
    fn emit(&self, event: &StatusEvent) {
        let line = self.format(event);
        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Status output is best effort.
        let _ = writeln!(writer, "{}", line);
    }
}
