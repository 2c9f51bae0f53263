use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lerobot_gui_client::GuiClient;

use crate::region::{Region, RegionHandle};

/// When the companion indicator of a directory field is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnWhen {
    /// "Directory not found".
    Missing,
    /// "Directory already exists".
    Exists,
}

impl WarnWhen {
    pub fn message(&self) -> &'static str {
        match self {
            WarnWhen::Missing => "Directory not found",
            WarnWhen::Exists => "Directory already exists",
        }
    }

    fn visible(&self, exists: bool) -> bool {
        match self {
            WarnWhen::Missing => !exists,
            WarnWhen::Exists => exists,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryIndicator {
    pub visible: bool,
    /// Path the current visibility was computed for.
    pub checked: Option<String>,
}

/// Checks a directory field against the backend on every input.
///
/// Only the answer for the most recent input is applied. With a non-zero
/// debounce, inputs that are followed by another one within the window never
/// reach the backend.
#[derive(Clone)]
pub struct DirectoryWatch {
    client: GuiClient,
    warn_when: WarnWhen,
    debounce: Duration,
    latest: Arc<AtomicU64>,
    indicator: RegionHandle<DirectoryIndicator>,
}

impl DirectoryWatch {
    pub fn new(
        client: GuiClient,
        warn_when: WarnWhen,
        debounce: Duration,
        indicator: &Region<DirectoryIndicator>,
    ) -> Self {
        Self {
            client,
            warn_when,
            debounce,
            latest: Arc::new(AtomicU64::new(0)),
            indicator: indicator.handle(),
        }
    }

    pub fn warn_when(&self) -> WarnWhen {
        self.warn_when
    }

    /// Called with the field's new value after each edit.
    pub fn input(&self, value: &str) -> JoinHandle<()> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let watch = self.clone();
        let value = value.to_string();

        tokio::spawn(async move { watch.check(generation, value).await })
    }

    async fn check(&self, generation: u64, value: String) {
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
            if !self.is_latest(generation) {
                return;
            }
        }

        let status = match self.client.check_directory(&value).await {
            Ok(status) => status,
            Err(err) => {
                warn!(dir_path = %value, err = ?err, "Failed to fetch directory status");
                return;
            }
        };

        let warn_when = self.warn_when;
        let applied = self.indicator.update(|indicator| {
            // an older keystroke answering late must not win
            if !self.is_latest(generation) {
                return false;
            }
            indicator.visible = warn_when.visible(status.exists);
            indicator.checked = Some(value.clone());
            true
        });

        debug!(dir_path = %value, exists = status.exists, ?applied, "Directory checked");
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity() {
        assert!(WarnWhen::Missing.visible(false));
        assert!(!WarnWhen::Missing.visible(true));
        assert!(WarnWhen::Exists.visible(true));
        assert!(!WarnWhen::Exists.visible(false));
    }
}
