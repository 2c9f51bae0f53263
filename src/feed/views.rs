use std::{collections::VecDeque, fmt::Display};

use serde::{Deserialize, Serialize};

use lerobot_gui_client::{events::StreamEvent, models::JointReading};

/// Something a live feed renders into.
pub trait FeedView: Send + 'static {
    fn render(&mut self, event: &StreamEvent);

    /// Shown in place of a payload that could not be decoded.
    fn render_empty(&mut self) {}
}

/// Append-only list of log lines that always follows the newest entry.
#[derive(Debug, Clone, Default)]
pub struct LogPanel {
    lines: VecDeque<String>,
    capacity: Option<usize>,
    dropped: usize,
    scroll_position: Option<usize>,
}

impl LogPanel {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines discarded to stay within capacity.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Index of the row the view is scrolled to.
    pub fn scroll_position(&self) -> Option<usize> {
        self.scroll_position
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());

        if let Some(capacity) = self.capacity {
            while self.lines.len() > capacity {
                self.lines.pop_front();
                self.dropped += 1;
            }
        }

        self.scroll_position = self.lines.len().checked_sub(1);
    }
}

impl FeedView for LogPanel {
    fn render(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Line(line) => self.push(line.as_str()),
            StreamEvent::Joints(joints) => {
                for joint in joints {
                    self.push(format!(
                        "{}: state={} action={}",
                        joint.joint, joint.state, joint.action
                    ));
                }
            }
        }
    }
}

/// How successive structured payloads map onto existing table rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowMatching {
    /// Rows are created from the first payload and later payloads update
    /// them by index. Extra items are ignored, missing items keep stale
    /// values, and a reordered payload lands on the wrong joint names.
    #[default]
    Positional,
    /// Rows are keyed by joint name; unseen joints are appended.
    ByJoint,
    /// Every payload replaces the whole table.
    Rebuild,
}

impl std::str::FromStr for RowMatching {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positional" => Ok(RowMatching::Positional),
            "by-joint" | "by_joint" => Ok(RowMatching::ByJoint),
            "rebuild" => Ok(RowMatching::Rebuild),
            other => Err(crate::Error::General(format!(
                "Unknown row matching policy: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub joint: String,
    pub state: f64,
    pub action: f64,
}

impl From<&JointReading> for TableRow {
    fn from(reading: &JointReading) -> Self {
        Self {
            joint: reading.joint.clone(),
            state: reading.state,
            action: reading.action,
        }
    }
}

/// Joint / state / action table fed by a structured stream.
#[derive(Debug, Clone, Default)]
pub struct StateActionTable {
    rows: Vec<TableRow>,
    matching: RowMatching,
}

impl StateActionTable {
    pub fn new(matching: RowMatching) -> Self {
        Self {
            rows: Vec::new(),
            matching,
        }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn matching(&self) -> RowMatching {
        self.matching
    }

    pub fn apply(&mut self, readings: &[JointReading]) {
        match self.matching {
            RowMatching::Positional => {
                if self.rows.is_empty() {
                    self.rows = readings.iter().map(TableRow::from).collect();
                    return;
                }
                for (row, reading) in self.rows.iter_mut().zip(readings) {
                    row.state = reading.state;
                    row.action = reading.action;
                }
            }
            RowMatching::ByJoint => {
                for reading in readings {
                    match self.rows.iter_mut().find(|row| row.joint == reading.joint) {
                        Some(row) => {
                            row.state = reading.state;
                            row.action = reading.action;
                        }
                        None => self.rows.push(reading.into()),
                    }
                }
            }
            RowMatching::Rebuild => {
                self.rows = readings.iter().map(TableRow::from).collect();
            }
        }
    }
}

impl FeedView for StateActionTable {
    fn render(&mut self, event: &StreamEvent) {
        // the end-of-stream sentinel is the only line a structured feed sends
        if let StreamEvent::Joints(readings) = event {
            self.apply(readings);
        }
    }

    fn render_empty(&mut self) {
        self.rows.clear();
    }
}

impl Display for StateActionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "no data");
        }

        writeln!(f, "{:<16}{:>10}{:>10}", "joint", "state", "action")?;
        for row in &self.rows {
            writeln!(f, "{:<16}{:>10.3}{:>10.3}", row.joint, row.state, row.action)?;
        }
        Ok(())
    }
}
