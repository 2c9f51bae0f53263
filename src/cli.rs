use clap::{Parser, Subcommand, ValueEnum};

use lerobot_gui_client::{
    endpoints::{HgDaggerEvent, RecordEvent},
    models::Mode,
};
use lerobot_panel::{
    Config, Error, Result,
    config::Args,
    feed::RowMatching,
    form::{WarnWhen, presets},
};

#[derive(Debug, Parser)]
#[command(name = "lerobot-panel", version, about = "Control panel for the LeRobot GUI backend")]
pub struct Cli {
    #[command(flatten)]
    pub args: Args<Config>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a config file interactively.
    Init,
    /// List the backend endpoints that take no parameter.
    Endpoints,
    /// Show a mode's controls, loaded config form and cards.
    Panel { mode: Mode },
    /// Switch the backend into a mode.
    Mode { mode: Mode },
    /// Stop the running session.
    Stop,
    /// Reset the robot. Refused while a session runs.
    Reset,
    /// Move the robot to its home position. Refused while a session runs.
    Home,
    /// Record lifecycle events.
    Record {
        #[arg(value_enum)]
        event: RecordAction,
    },
    /// HG-DAgger intervention events.
    HgDagger {
        #[arg(value_enum)]
        event: HgDaggerAction,
    },
    /// Calibrate an arm, or list arms and connected cameras.
    Calibrate { arm: Option<String> },
    /// List camera feeds.
    Cameras,
    /// List the videos of the loaded dataset episode.
    Videos,
    /// Show the loaded dataset, optionally switching episode first.
    Dataset {
        #[arg(long)]
        episode: Option<usize>,
    },
    /// Show or edit a mode's control configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Check whether a directory exists on the backend host.
    CheckDir {
        path: String,
        /// Warn the way this mode's form does.
        #[arg(long, conflicts_with = "warn_when")]
        mode: Option<Mode>,
        /// Defaults to `missing`.
        #[arg(long, value_enum)]
        warn_when: Option<WarnWhenArg>,
    },
    /// Send one key press (r, right, left, esc or a raw key name).
    Key { key: String },
    /// Follow the backend log stream.
    Logs,
    /// Follow the joint state/action stream.
    State {
        #[arg(long)]
        matching: Option<RowMatching>,
        /// Follow the dataset replay stream instead of the robot.
        #[arg(long)]
        dataset: bool,
    },
    /// Run a mode session: logs are streamed and stdin lines become key presses.
    Session { mode: Mode },
}

impl Command {
    /// Commands that run a first-time setup prompt when no config file exists.
    pub fn prompts_for_setup(&self) -> bool {
        matches!(self, Command::Panel { .. } | Command::Session { .. })
    }
}

/// Warning polarity for `check-dir`.
pub fn check_dir_polarity(mode: Option<Mode>, warn_when: Option<WarnWhenArg>) -> Result<WarnWhen> {
    match (mode, warn_when) {
        (_, Some(warn_when)) => Ok(warn_when.into()),
        (Some(mode), None) => presets::schema(mode)
            .and_then(|schema| schema.directory_check)
            .map(|check| check.warn_when)
            .ok_or_else(|| Error::Form(format!("{mode} has no directory field"))),
        (None, None) => Ok(WarnWhen::Missing),
    }
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Show { mode: Mode },
    /// Load, apply `field=value` edits and submit.
    Set {
        mode: Mode,
        #[arg(required = true)]
        assignments: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordAction {
    Start,
    Finish,
    Cancel,
}

impl From<RecordAction> for RecordEvent {
    fn from(action: RecordAction) -> Self {
        match action {
            RecordAction::Start => RecordEvent::Start,
            RecordAction::Finish => RecordEvent::Finish,
            RecordAction::Cancel => RecordEvent::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HgDaggerAction {
    InterruptPolicy,
    TakeControl,
    GiveControl,
    FinishEarly,
}

impl From<HgDaggerAction> for HgDaggerEvent {
    fn from(action: HgDaggerAction) -> Self {
        match action {
            HgDaggerAction::InterruptPolicy => HgDaggerEvent::InterruptPolicy,
            HgDaggerAction::TakeControl => HgDaggerEvent::TakeControl,
            HgDaggerAction::GiveControl => HgDaggerEvent::GiveControl,
            HgDaggerAction::FinishEarly => HgDaggerEvent::FinishEarly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WarnWhenArg {
    Missing,
    Exists,
}

impl From<WarnWhenArg> for WarnWhen {
    fn from(arg: WarnWhenArg) -> Self {
        match arg {
            WarnWhenArg::Missing => WarnWhen::Missing,
            WarnWhenArg::Exists => WarnWhen::Exists,
        }
    }
}
