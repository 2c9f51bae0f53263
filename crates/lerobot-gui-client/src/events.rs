use crate::{
    Error,
    endpoints::{Endpoint, STREAM_END_SENTINEL},
    models::JointReading,
};

/// Server-push channel the panel can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Logs,
    StateAction,
    DatasetStateAction,
}

impl FeedKind {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            FeedKind::Logs => Endpoint::StreamLogs,
            FeedKind::StateAction => Endpoint::StreamStateAction,
            FeedKind::DatasetStateAction => Endpoint::StreamDatasetStateAction,
        }
    }

    pub fn is_structured(&self) -> bool {
        !matches!(self, FeedKind::Logs)
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedKind::Logs => write!(f, "logs"),
            FeedKind::StateAction => write!(f, "state-action"),
            FeedKind::DatasetStateAction => write!(f, "dataset-state-action"),
        }
    }
}

/// One decoded server-push message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Line(String),
    Joints(Vec<JointReading>),
}

impl StreamEvent {
    pub fn decode(kind: FeedKind, data: &str) -> Result<Self, Error> {
        if !kind.is_structured() || data == STREAM_END_SENTINEL {
            return Ok(StreamEvent::Line(data.to_string()));
        }

        let joints = serde_json::from_str::<Vec<JointReading>>(data)?;
        Ok(StreamEvent::Joints(joints))
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, StreamEvent::Line(line) if line == STREAM_END_SENTINEL)
    }
}

/// What a subscription yields for every dispatched server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Event(StreamEvent),
    Malformed { data: String, reason: String },
}

impl FeedMessage {
    pub fn decode(kind: FeedKind, data: String) -> Self {
        match StreamEvent::decode(kind, &data) {
            Ok(event) => FeedMessage::Event(event),
            Err(e) => FeedMessage::Malformed {
                data,
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Chunks may split lines and
/// multi-byte characters anywhere; only complete lines are interpreted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }

        messages
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            // retry hints are meaningless without reconnects
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }

        let data = self.data.join("\n");
        self.data.clear();

        Some(SseMessage {
            event: self.event.take(),
            id: self.last_id.clone(),
            data,
        })
    }
}
