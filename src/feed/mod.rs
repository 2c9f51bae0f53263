//! Live feed rendering.
//!
//! A [`LiveFeed`] owns at most one backend subscription and renders whatever
//! it delivers into a view region:
//!
//! ```text
//! Idle -> Connecting -> Streaming -> Closed(reason)
//!              \___________________/
//! ```
//!
//! `Closed` is final for a subscription. Calling [`LiveFeed::start`] again
//! opens a fresh one; nothing is resumed and no reconnect happens on its own.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use lerobot_gui_client::{GuiClient, events::FeedKind, events::FeedMessage};

use crate::region::{Region, RegionHandle};

mod views;

pub use views::{FeedView, LogPanel, RowMatching, StateActionTable, TableRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The backend sent the end-of-stream line.
    Sentinel,
    /// Closed by the owner.
    Stopped,
    /// Connection refused, dropped, or ended by the backend.
    TransportError,
    /// The view region was dropped while the feed was open.
    RegionGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Connecting,
    Streaming,
    Closed(CloseReason),
}

impl FeedState {
    pub fn is_closed(&self) -> bool {
        matches!(self, FeedState::Closed(_))
    }
}

/// Epoch plus published state. Both only change together, under the watch
/// channel's lock, so a superseded task can never overwrite a newer state.
#[derive(Debug)]
struct FeedControl {
    epoch: AtomicU64,
    state: watch::Sender<FeedState>,
}

impl FeedControl {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Starts a new epoch in `state`.
    fn advance(&self, state: FeedState) -> u64 {
        let mut epoch = 0;
        self.state.send_modify(|current| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            *current = state;
        });
        epoch
    }

    /// Moves to `state` if `epoch` is still current and the feed is open.
    fn transition(&self, epoch: u64, state: FeedState) -> bool {
        self.state.send_if_modified(|current| {
            if !self.is_current(epoch) || current.is_closed() || *current == state {
                return false;
            }
            *current = state;
            true
        })
    }
}

/// Handle to one logical feed rendered into one region.
pub struct LiveFeed<V: FeedView> {
    client: GuiClient,
    kind: FeedKind,
    target: RegionHandle<V>,
    control: Arc<FeedControl>,
    task: Option<JoinHandle<()>>,
}

impl<V: FeedView> LiveFeed<V> {
    pub fn new(client: GuiClient, kind: FeedKind, target: &Region<V>) -> Self {
        let (state, _) = watch::channel(FeedState::Idle);

        Self {
            client,
            kind,
            target: target.handle(),
            control: Arc::new(FeedControl {
                epoch: AtomicU64::new(0),
                state,
            }),
            task: None,
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn state(&self) -> FeedState {
        *self.control.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.control.state.subscribe()
    }

    /// Opens a fresh subscription, replacing any open one. Must be called
    /// from within a tokio runtime.
    pub fn start(&mut self) {
        let epoch = self.fence(FeedState::Connecting);
        if let Some(task) = self.task.take() {
            task.abort();
        }

        debug!(feed = %self.kind, epoch, "Starting feed");
        self.task = Some(tokio::spawn(run_feed(
            self.client.clone(),
            self.kind,
            self.target.clone(),
            self.control.clone(),
            epoch,
        )));
    }

    /// Closes the current subscription. No rendering happens once this returns.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !self.state().is_closed() {
                self.fence(FeedState::Closed(CloseReason::Stopped));
                info!(feed = %self.kind, "Feed stopped");
            }
            task.abort();
        }
    }

    pub fn dispose(mut self) {
        self.stop();
    }

    /// Waits until the current subscription is closed. Never resolves while
    /// the feed is idle.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.watch();
        match rx.wait_for(FeedState::is_closed).await {
            Ok(state) => match *state {
                FeedState::Closed(reason) => reason,
                _ => CloseReason::Stopped,
            },
            Err(_) => CloseReason::Stopped,
        }
    }

    // Holding the region lock while the epoch moves guarantees that a render
    // from the previous epoch is either finished or will be refused.
    fn fence(&self, state: FeedState) -> u64 {
        let control = &self.control;
        self.target
            .update(|_| control.advance(state))
            .unwrap_or_else(|| control.advance(state))
    }
}

impl<V: FeedView> Drop for LiveFeed<V> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_feed<V: FeedView>(
    client: GuiClient,
    kind: FeedKind,
    target: RegionHandle<V>,
    control: Arc<FeedControl>,
    epoch: u64,
) {
    let close = |reason: CloseReason| {
        if control.transition(epoch, FeedState::Closed(reason)) {
            info!(feed = %kind, ?reason, "Feed closed");
        }
    };

    if !target.is_alive() {
        close(CloseReason::RegionGone);
        return;
    }

    let mut subscription = match client.subscribe(kind).await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(feed = %kind, err = ?err, "Failed to open feed");
            close(CloseReason::TransportError);
            return;
        }
    };

    loop {
        let message = match subscription.recv().await {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                warn!(feed = %kind, err = ?err, "Feed ended");
                close(CloseReason::TransportError);
                return;
            }
            None => {
                close(CloseReason::TransportError);
                return;
            }
        };

        let rendered = target.update(|view| {
            if !control.is_current(epoch) {
                return None;
            }

            let sentinel = match &message {
                FeedMessage::Event(event) => {
                    view.render(event);
                    event.is_sentinel()
                }
                FeedMessage::Malformed { data, reason } => {
                    warn!(feed = %kind, %data, %reason, "Malformed feed payload");
                    view.render_empty();
                    false
                }
            };
            control.transition(epoch, FeedState::Streaming);
            Some(sentinel)
        });

        match rendered {
            None => {
                close(CloseReason::RegionGone);
                return;
            }
            // superseded by a restart or stop
            Some(None) => return,
            Some(Some(true)) => {
                close(CloseReason::Sentinel);
                return;
            }
            Some(Some(false)) => {}
        }
    }
}
