//! User-facing surfacing of command outcomes.
//!
//! A *notice* is informational and never interrupts the user; an *alert* is a
//! blocking notification the user has to see (form submissions report this way).

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub at: DateTime<Utc>,
    pub severity: Severity,
    pub blocking: bool,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notice(&self, severity: Severity, message: &str);
    fn alert(&self, severity: Severity, message: &str);
}

/// Sends everything to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notice(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!("{message}"),
            Severity::Error => error!("{message}"),
        }
    }

    fn alert(&self, severity: Severity, message: &str) {
        self.notice(severity, message);
    }
}

/// Notices go to the log, alerts are printed for the operator.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notice(&self, severity: Severity, message: &str) {
        LogNotifier.notice(severity, message);
    }

    fn alert(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => println!("{message}"),
            Severity::Error => eprintln!("{message}"),
        }
    }
}

/// Keeps every notification in memory for a caller to inspect or drain.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        match self.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, severity: Severity, blocking: bool, message: &str) {
        let notification = Notification {
            at: Utc::now(),
            severity,
            blocking,
            message: message.to_string(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notice(&self, severity: Severity, message: &str) {
        self.push(severity, false, message);
    }

    fn alert(&self, severity: Severity, message: &str) {
        self.push(severity, true, message);
    }
}
