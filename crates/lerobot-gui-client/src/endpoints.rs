//! Static mapping from panel actions to backend paths and methods.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::models::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub name: &'static str,
    pub path: String,
    pub method: Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordEvent {
    Start,
    Finish,
    Cancel,
}

impl Display for RecordEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordEvent::Start => write!(f, "start"),
            RecordEvent::Finish => write!(f, "finish"),
            RecordEvent::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HgDaggerEvent {
    InterruptPolicy,
    TakeControl,
    GiveControl,
    FinishEarly,
}

impl Display for HgDaggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HgDaggerEvent::InterruptPolicy => write!(f, "interrupt_policy"),
            HgDaggerEvent::TakeControl => write!(f, "take_control"),
            HgDaggerEvent::GiveControl => write!(f, "give_control"),
            HgDaggerEvent::FinishEarly => write!(f, "finish_early"),
        }
    }
}

/// Logical backend action. Paths are relative to the backend base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    ListCameras,
    ListConfigPaths,
    ControlConfig(Mode),
    SelectMode(Mode),
    Stop,
    Reset,
    HomeRobot,
    RecordEvent(RecordEvent),
    HgDaggerEvent(HgDaggerEvent),
    CheckDirectoryExists,
    KeyboardInput,
    CalibrationArms,
    CalibrateArm(String),
    ConnectedCameraPorts,
    DatasetVideos,
    DatasetInfo,
    ChangeEpisode(usize),
    StreamLogs,
    StreamStateAction,
    StreamDatasetStateAction,
}

/// Endpoints that take no parameter, addressable by name.
pub static STATIC_ENDPOINTS: [Endpoint; 14] = [
    Endpoint::ListCameras,
    Endpoint::ListConfigPaths,
    Endpoint::Stop,
    Endpoint::Reset,
    Endpoint::HomeRobot,
    Endpoint::CheckDirectoryExists,
    Endpoint::KeyboardInput,
    Endpoint::CalibrationArms,
    Endpoint::ConnectedCameraPorts,
    Endpoint::DatasetVideos,
    Endpoint::DatasetInfo,
    Endpoint::StreamLogs,
    Endpoint::StreamStateAction,
    Endpoint::StreamDatasetStateAction,
];

/// Log line the backend sends as the last message of a log stream.
pub const STREAM_END_SENTINEL: &str = "--- Streaming ended ---";

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::ListCameras => "list_cameras",
            Endpoint::ListConfigPaths => "list_config_paths",
            Endpoint::ControlConfig(_) => "load_control_config",
            Endpoint::SelectMode(_) => "select_mode",
            Endpoint::Stop => "stop",
            Endpoint::Reset => "reset",
            Endpoint::HomeRobot => "home_robot",
            Endpoint::RecordEvent(_) => "record_event",
            Endpoint::HgDaggerEvent(_) => "hg_dagger_event",
            Endpoint::CheckDirectoryExists => "check_directory_exists",
            Endpoint::KeyboardInput => "keyboard_input",
            Endpoint::CalibrationArms => "calibration_arms",
            Endpoint::CalibrateArm(_) => "calibrate_arm",
            Endpoint::ConnectedCameraPorts => "connected_camera_ports",
            Endpoint::DatasetVideos => "dataset_videos",
            Endpoint::DatasetInfo => "dataset_info",
            Endpoint::ChangeEpisode(_) => "change_episode",
            Endpoint::StreamLogs => "stream_logs",
            Endpoint::StreamStateAction => "stream_state_action",
            Endpoint::StreamDatasetStateAction => "stream_dataset_state_action",
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::ListCameras => "/robot/cameras".to_string(),
            Endpoint::ListConfigPaths => "/robot/configs-path".to_string(),
            Endpoint::ControlConfig(mode) => format!("/robot/get-control-config/{mode}"),
            Endpoint::SelectMode(mode) => format!("/select_mode/{mode}"),
            Endpoint::Stop => "/robot/stop".to_string(),
            Endpoint::Reset => "/robot/reset".to_string(),
            Endpoint::HomeRobot => "/api/home-robot".to_string(),
            Endpoint::RecordEvent(event) => format!("/robot/record/event/{event}"),
            Endpoint::HgDaggerEvent(event) => format!("/robot/hg-dagger/event/{event}"),
            Endpoint::CheckDirectoryExists => "/api/check-directory-exists".to_string(),
            Endpoint::KeyboardInput => "/api/event/keyboard-input".to_string(),
            Endpoint::CalibrationArms => "/robot/calibrate/get-arms-name".to_string(),
            Endpoint::CalibrateArm(arm) => format!("/robot/calibrate/{arm}"),
            Endpoint::ConnectedCameraPorts => "/robot/calibrate/get-connected-cams-port".to_string(),
            Endpoint::DatasetVideos => "/dataset/get-video-info".to_string(),
            Endpoint::DatasetInfo => "/dataset/get-dataset-info".to_string(),
            Endpoint::ChangeEpisode(episode) => format!("/dataset/change-episode/{episode}"),
            Endpoint::StreamLogs => "/robot/stream-logs".to_string(),
            Endpoint::StreamStateAction => "/robot/stream-state-action".to_string(),
            Endpoint::StreamDatasetStateAction => "/dataset/get-state-action".to_string(),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::CheckDirectoryExists | Endpoint::KeyboardInput => Method::Post,
            _ => Method::Get,
        }
    }

    /// The backend answers only once the robot has finished, so no overall
    /// request timeout applies.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Endpoint::CalibrateArm(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            Endpoint::StreamLogs | Endpoint::StreamStateAction | Endpoint::StreamDatasetStateAction
        )
    }

    pub fn descriptor(&self) -> EndpointDescriptor {
        EndpointDescriptor {
            name: self.name(),
            path: self.path(),
            method: self.method(),
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

pub fn lookup(name: &str) -> Option<&'static Endpoint> {
    STATIC_ENDPOINTS.iter().find(|e| e.name() == name)
}

/// Default form action for a mode's control config, if the backend accepts one.
pub fn config_update_path(mode: Mode) -> Option<&'static str> {
    match mode {
        // the backend route really is spelled "telop"
        Mode::Teleop => Some("/robot/telop/config-update"),
        Mode::Record => Some("/robot/record/config-update"),
        Mode::Eval => Some("/robot/eval/config-update"),
        Mode::HgDagger => Some("/robot/hg-dagger/config-update"),
        Mode::Calibrate | Mode::Replay => None,
    }
}
