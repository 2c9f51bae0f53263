use std::sync::Arc;

use reqwest::StatusCode;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use lerobot_gui_client::{GuiClient, endpoints::Endpoint, models::CommandStatus};

use crate::notify::{Notifier, Severity};

/// Result of one command attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx. `status` is the backend's `{"status": ...}` answer when it sent one.
    Completed { status: Option<CommandStatus> },
    Rejected(StatusCode),
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed { status: Some(status) } => write!(f, "ok ({})", status.status),
            Outcome::Completed { status: None } => write!(f, "ok"),
            Outcome::Rejected(status) => write!(f, "rejected ({status})"),
            Outcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Sends single-shot commands. Every call is one attempt; overlapping calls
/// for the same endpoint are not coalesced.
#[derive(Clone)]
pub struct CommandDispatcher {
    client: GuiClient,
    notifier: Arc<dyn Notifier>,
}

impl CommandDispatcher {
    pub fn new(client: GuiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    pub fn client(&self) -> &GuiClient {
        &self.client
    }

    pub async fn dispatch(&self, endpoint: &Endpoint) -> Outcome {
        let result = self.client.command(endpoint).await;
        self.report(&endpoint.to_string(), result)
    }

    /// Runs [`dispatch`](Self::dispatch) in the background.
    pub fn spawn(&self, endpoint: Endpoint) -> JoinHandle<Outcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(&endpoint).await })
    }

    /// Forwards one key press to the running session.
    pub async fn send_key(&self, key: &str) -> Outcome {
        let result = self.client.keyboard_input(key).await;
        self.report(&format!("{} {key}", Endpoint::KeyboardInput), result)
    }

    fn report(
        &self,
        endpoint: &str,
        result: lerobot_gui_client::Result<Option<CommandStatus>>,
    ) -> Outcome {
        match result {
            Ok(status) => {
                match &status {
                    Some(status) if !status.is_success() => {
                        warn!(endpoint, status = %status.status, "Command refused by backend");
                        self.notifier.notice(
                            Severity::Error,
                            &format!("{endpoint}: backend answered {}", status.status),
                        );
                    }
                    _ => info!(endpoint, "Command completed"),
                }
                Outcome::Completed { status }
            }
            Err(err) => match err.status() {
                Some(status) => {
                    warn!(endpoint, %status, "Command rejected");
                    self.notifier
                        .alert(Severity::Error, &format!("{endpoint} failed ({status})"));
                    Outcome::Rejected(status)
                }
                None => {
                    error!(endpoint, err = ?err, "Command failed");
                    self.notifier
                        .notice(Severity::Error, &format!("{endpoint} failed: {err}"));
                    Outcome::Failed(err.to_string())
                }
            },
        }
    }
}
