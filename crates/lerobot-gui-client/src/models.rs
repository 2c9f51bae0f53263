use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Operating session of the robot backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Teleop,
    Record,
    Eval,
    HgDagger,
    Calibrate,
    Replay,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Teleop => write!(f, "teleop"),
            Mode::Record => write!(f, "record"),
            Mode::Eval => write!(f, "eval"),
            Mode::HgDagger => write!(f, "hg_dagger"),
            Mode::Calibrate => write!(f, "calibrate"),
            Mode::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "teleop" => Ok(Mode::Teleop),
            "record" => Ok(Mode::Record),
            "eval" => Ok(Mode::Eval),
            "hg_dagger" => Ok(Mode::HgDagger),
            "calibrate" => Ok(Mode::Calibrate),
            "replay" => Ok(Mode::Replay),
            other => Err(Error::Api(format!("Unknown mode: {other}"))),
        }
    }
}

/// Camera or recorded video, rendered as a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardItem {
    #[serde(default)]
    pub id: Option<u32>,
    pub name: String,
    pub video_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointReading {
    pub joint: String,
    pub state: f64,
    pub action: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    pub status: String,
}

impl CommandStatus {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DirectoryQuery<'a> {
    pub dir_path: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStatus {
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct KeyboardInput<'a> {
    pub data: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPort {
    pub index: serde_json::Value,
    pub port: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub repo_id: String,
    pub num_episodes: usize,
    pub num_samples: usize,
    pub fps: f64,
}
