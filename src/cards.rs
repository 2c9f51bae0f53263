//! One-shot resource lists rendered as cards.
//!
//! Each build fetches its list once and then replaces the whole grid. When
//! builds overlap, only the most recently started one may commit; results
//! from older ones are dropped. A failed fetch still commits: the grid is
//! cleared and left empty.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use lerobot_gui_client::{
    GuiClient,
    endpoints::Endpoint,
    models::{CameraPort, CardItem},
};

use crate::region::{Region, RegionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSource {
    Cameras,
    DatasetVideos,
    CalibrationArms,
    CameraPorts,
}

impl CardSource {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            CardSource::Cameras => Endpoint::ListCameras,
            CardSource::DatasetVideos => Endpoint::DatasetVideos,
            CardSource::CalibrationArms => Endpoint::CalibrationArms,
            CardSource::CameraPorts => Endpoint::ConnectedCameraPorts,
        }
    }
}

impl std::fmt::Display for CardSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardSource::Cameras => write!(f, "cameras"),
            CardSource::DatasetVideos => write!(f, "dataset-videos"),
            CardSource::CalibrationArms => write!(f, "calibration-arms"),
            CardSource::CameraPorts => write!(f, "camera-ports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: String,
    pub details: Vec<String>,
    /// Video feed shown on the card.
    pub media: Option<Url>,
    /// Command bound to the card's button.
    pub action: Option<Endpoint>,
}

impl Card {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            details: Vec::new(),
            media: None,
            action: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardGrid {
    pub cards: Vec<Card>,
}

impl CardGrid {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl std::fmt::Display for CardGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for card in &self.cards {
            write!(f, "{}", card.title)?;
            for detail in &card.details {
                write!(f, "  {detail}")?;
            }
            if let Some(media) = &card.media {
                write!(f, "  {media}")?;
            }
            if let Some(action) = &card.action {
                write!(f, "  [{action}]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Rendered(usize),
    /// The fetch failed; the grid was cleared.
    Failed(String),
    /// A newer build started before this one finished.
    Superseded,
    RegionGone,
}

#[derive(Clone)]
pub struct CardBuilder {
    client: GuiClient,
    latest: Arc<AtomicU64>,
    target: RegionHandle<CardGrid>,
}

impl CardBuilder {
    pub fn new(client: GuiClient, target: &Region<CardGrid>) -> Self {
        Self {
            client,
            latest: Arc::new(AtomicU64::new(0)),
            target: target.handle(),
        }
    }

    pub async fn build<P: CardProvider + ?Sized>(&self, source: &P) -> BuildOutcome {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(%source, generation, "Building cards");

        let fetched = source.cards(&self.client).await;

        let committed = self.target.update(|grid| {
            if self.latest.load(Ordering::SeqCst) != generation {
                return BuildOutcome::Superseded;
            }
            grid.cards.clear();
            match &fetched {
                Ok(cards) => {
                    grid.cards.extend(cards.iter().cloned());
                    BuildOutcome::Rendered(cards.len())
                }
                Err(err) => BuildOutcome::Failed(err.to_string()),
            }
        });

        let outcome = committed.unwrap_or(BuildOutcome::RegionGone);
        match &outcome {
            BuildOutcome::Rendered(count) => info!(%source, count, "Cards rendered"),
            BuildOutcome::Failed(err) => warn!(%source, %err, "Error fetching cards"),
            BuildOutcome::Superseded => debug!(%source, generation, "Dropped stale cards"),
            BuildOutcome::RegionGone => debug!(%source, "Card region gone"),
        }
        outcome
    }

    pub fn spawn<P: CardProvider + 'static>(&self, source: P) -> JoinHandle<BuildOutcome> {
        let builder = self.clone();
        tokio::spawn(async move { builder.build(&source).await })
    }
}

/// A list the backend can be asked for, turned into cards.
#[async_trait]
pub trait CardProvider: std::fmt::Display + Send + Sync {
    async fn cards(&self, client: &GuiClient) -> lerobot_gui_client::Result<Vec<Card>>;
}

#[async_trait]
impl CardProvider for CardSource {
    async fn cards(&self, client: &GuiClient) -> lerobot_gui_client::Result<Vec<Card>> {
        Ok(match self {
            CardSource::Cameras => media_cards(client, client.cameras().await?),
            CardSource::DatasetVideos => media_cards(client, client.dataset_videos().await?),
            CardSource::CalibrationArms => client
                .calibration_arms()
                .await?
                .into_iter()
                .map(|arm| Card {
                    action: Some(Endpoint::CalibrateArm(arm.clone())),
                    ..Card::titled(arm)
                })
                .collect(),
            CardSource::CameraPorts => port_cards(client.connected_camera_ports().await?),
        })
    }
}

/// Relative video urls are resolved against the backend address.
fn media_cards(client: &GuiClient, items: Vec<CardItem>) -> Vec<Card> {
    items
        .into_iter()
        .map(|item| {
            let media = match client.url(&item.video_url) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(video_url = %item.video_url, err = ?err, "Unusable video url");
                    None
                }
            };
            Card {
                media,
                ..Card::titled(item.name)
            }
        })
        .collect()
}

fn port_cards(ports: Vec<CameraPort>) -> Vec<Card> {
    ports
        .into_iter()
        .enumerate()
        .map(|(n, port)| Card {
            details: vec![
                format!("Index: {}", plain(&port.index)),
                format!("Port: {}", plain(&port.port)),
            ],
            ..Card::titled(format!("Camera{n}"))
        })
        .collect()
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
