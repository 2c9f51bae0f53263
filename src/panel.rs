//! Per-mode panel layouts and the interactive session loop.

use std::{future::Future, sync::Arc, time::Duration};

use futures_util::future::join_all;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use lerobot_gui_client::{
    GuiClient,
    endpoints::{Endpoint, HgDaggerEvent, RecordEvent},
    events::FeedKind,
    models::Mode,
};

use crate::{
    cards::{BuildOutcome, CardBuilder, CardGrid, CardSource},
    config::PanelConfig,
    dispatch::{CommandDispatcher, Outcome},
    feed::{CloseReason, FeedView, LiveFeed},
    form::{ConfigForm, DirectoryIndicator, FormSchema, FormSynchronizer, presets},
    notify::Notifier,
    region::Region,
};

/// Key aliases accepted on the session prompt and the key the backend expects.
pub const KEY_BINDINGS: [(&str, &str, &str); 4] = [
    ("r", "r", "start recording"),
    ("right", "ArrowRight", "finish episode"),
    ("left", "ArrowLeft", "discard episode"),
    ("esc", "escape", "stop recording"),
];

/// Backend key for a typed alias; anything else is forwarded as typed.
pub fn key_for(input: &str) -> &str {
    KEY_BINDINGS
        .iter()
        .find(|(alias, key, _)| *alias == input || *key == input)
        .map_or(input, |(_, key, _)| *key)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub name: &'static str,
    pub endpoint: Endpoint,
}

impl Control {
    fn new(name: &'static str, endpoint: Endpoint) -> Self {
        Self { name, endpoint }
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub mode: Mode,
    pub controls: Vec<Control>,
    pub form: Option<FormSchema>,
    pub feeds: Vec<FeedKind>,
    pub cards: Vec<CardSource>,
    /// Debounce for the form's directory field check.
    pub directory_debounce: Duration,
}

impl Panel {
    pub fn for_mode(mode: Mode, config: &PanelConfig) -> Self {
        let mut controls = match mode {
            Mode::Calibrate => vec![],
            _ => vec![Control::new("start_session", Endpoint::SelectMode(mode))],
        };
        controls.push(Control::new("stop_session", Endpoint::Stop));

        match mode {
            Mode::Teleop => controls.extend([
                Control::new("reset", Endpoint::Reset),
                Control::new("home", Endpoint::HomeRobot),
            ]),
            Mode::Record => controls.extend([
                Control::new("start_recording", Endpoint::RecordEvent(RecordEvent::Start)),
                Control::new("finish_recording", Endpoint::RecordEvent(RecordEvent::Finish)),
                Control::new("cancel_recording", Endpoint::RecordEvent(RecordEvent::Cancel)),
            ]),
            Mode::HgDagger => controls.extend(
                [
                    HgDaggerEvent::InterruptPolicy,
                    HgDaggerEvent::TakeControl,
                    HgDaggerEvent::GiveControl,
                    HgDaggerEvent::FinishEarly,
                ]
                .map(|event| {
                    let name = match event {
                        HgDaggerEvent::InterruptPolicy => "interrupt_policy",
                        HgDaggerEvent::TakeControl => "take_control",
                        HgDaggerEvent::GiveControl => "give_control",
                        HgDaggerEvent::FinishEarly => "finish_early",
                    };
                    Control::new(name, Endpoint::HgDaggerEvent(event))
                }),
            ),
            Mode::Eval | Mode::Calibrate | Mode::Replay => {}
        }

        let (feeds, cards) = match mode {
            Mode::Calibrate => (
                vec![FeedKind::Logs],
                vec![CardSource::CalibrationArms, CardSource::CameraPorts],
            ),
            Mode::Replay => (
                vec![FeedKind::DatasetStateAction],
                vec![CardSource::DatasetVideos],
            ),
            _ => (
                vec![FeedKind::Logs, FeedKind::StateAction],
                vec![CardSource::Cameras],
            ),
        };

        Self {
            mode,
            controls,
            form: presets::schema_with_overrides(mode, &config.form_actions),
            feeds,
            cards,
            directory_debounce: config.directory_check_debounce,
        }
    }

    pub fn control(&self, name: &str) -> Option<&Endpoint> {
        self.controls
            .iter()
            .find(|control| control.name == name)
            .map(|control| &control.endpoint)
    }
}

/// What a panel shows right after it opens.
#[derive(Debug, Clone)]
pub struct PanelSnapshot {
    pub form: Option<ConfigForm>,
    /// Set when the form has a directory field. Left unchecked when the form
    /// failed to load.
    pub directory: Option<DirectoryIndicator>,
    pub cards: Vec<(CardSource, CardGrid)>,
}

/// Loads the panel's form with its options, checks its directory field and
/// builds all of its card grids concurrently. Failures are logged and leave
/// the affected part at its defaults or empty.
pub async fn open_panel(
    client: &GuiClient,
    notifier: Arc<dyn Notifier>,
    panel: &Panel,
) -> PanelSnapshot {
    let load_form = async {
        let schema = panel.form.clone()?;
        let synchronizer = FormSynchronizer::new(client.clone(), notifier);
        let mut form = ConfigForm::new(schema);
        let loaded = synchronizer.load(&mut form).await;
        synchronizer.load_options(&mut form).await;

        let indicator = Region::new(DirectoryIndicator::default());
        let directory = match synchronizer.directory_watch(
            form.schema(),
            panel.directory_debounce,
            &indicator,
        ) {
            Some(watch) => {
                if loaded {
                    synchronizer.check_directory(&form, &watch).await;
                }
                Some(indicator.snapshot())
            }
            None => None,
        };
        Some((form, directory))
    };

    let build_cards = join_all(panel.cards.iter().map(|source| async move {
        let grid = Region::new(CardGrid::default());
        let outcome = CardBuilder::new(client.clone(), &grid).build(source).await;
        if let BuildOutcome::Failed(err) = outcome {
            warn!(%source, %err, "Panel cards unavailable");
        }
        (*source, grid.snapshot())
    }));

    let (form, cards) = tokio::join!(load_form, build_cards);
    let (form, directory) = form.unzip();
    PanelSnapshot {
        form,
        directory: directory.flatten(),
        cards,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub started: Outcome,
    pub keys_sent: usize,
    /// Set when the log feed closed before the session ended.
    pub feed_closed: Option<CloseReason>,
    pub stopped: Outcome,
}

/// Runs one mode session: selects the mode, streams logs into `logs`,
/// forwards each input line as a key press and stops the robot when input
/// ends, `shutdown` resolves or the log feed closes.
pub async fn run_session<V, R, S>(
    client: GuiClient,
    notifier: Arc<dyn Notifier>,
    mode: Mode,
    logs: &Region<V>,
    input: R,
    shutdown: S,
) -> SessionSummary
where
    V: FeedView,
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let dispatcher = CommandDispatcher::new(client.clone(), notifier);

    let started = dispatcher.dispatch(&Endpoint::SelectMode(mode)).await;
    info!(%mode, %started, "Session started");

    let mut feed = LiveFeed::new(client, FeedKind::Logs, logs);
    feed.start();

    let mut lines = input.lines();
    let mut keys_sent = 0;
    let mut feed_closed = None;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(%mode, "Session interrupted");
                break;
            }
            reason = feed.closed() => {
                feed_closed = Some(reason);
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if dispatcher.send_key(key_for(line)).await.is_success() {
                        keys_sent += 1;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(err = ?err, "Failed to read session input");
                    break;
                }
            },
        }
    }

    let stopped = dispatcher.dispatch(&Endpoint::Stop).await;
    feed.dispose();
    info!(%mode, %stopped, keys_sent, "Session ended");

    SessionSummary {
        started,
        keys_sent,
        feed_closed,
        stopped,
    }
}
