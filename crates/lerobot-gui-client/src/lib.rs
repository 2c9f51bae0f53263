use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::BackendConfig,
    endpoints::{Endpoint, Method},
    events::{FeedKind, FeedMessage, SseDecoder},
    models::{
        CameraPort, CardItem, CommandStatus, DatasetInfo, DirectoryQuery, DirectoryStatus,
        KeyboardInput, Mode,
    },
};

pub mod config;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};

const STREAM_CHANNEL_CAPACITY: usize = 100;

/// Client for the GUI control backend.
#[derive(Debug, Clone)]
pub struct GuiClient {
    client: Client,
    stream_client: Client,
    base_url: Url,
}

impl GuiClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout)
            .build()?;

        // streams stay open indefinitely, so only the connect phase is bounded
        let stream_client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(GuiClient {
            client,
            stream_client,
            base_url: config.address,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        Ok(self.client.request(method.into(), url))
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        let response = self
            .request(endpoint.method(), &endpoint.path())?
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Issues the endpoint's request with no body and returns the raw response,
    /// whatever its status. Long-running endpoints only bound the connect phase.
    pub async fn send(&self, endpoint: &Endpoint) -> Result<Response> {
        debug!(endpoint = %endpoint, "Sending command");
        let client = if endpoint.is_long_running() {
            &self.stream_client
        } else {
            &self.client
        };
        let url = self.url(&endpoint.path())?;
        Ok(client.request(endpoint.method().into(), url).send().await?)
    }

    /// Fire-and-forget command; the backend answers `{"status": ...}` for most
    /// of them but some reply with a bare `true`.
    pub async fn command(&self, endpoint: &Endpoint) -> Result<Option<CommandStatus>> {
        let response = self.send(endpoint).await?.error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice::<CommandStatus>(&body).ok())
    }

    pub async fn select_mode(&self, mode: Mode) -> Result<Option<CommandStatus>> {
        self.command(&Endpoint::SelectMode(mode)).await
    }

    pub async fn stop(&self) -> Result<Option<CommandStatus>> {
        self.command(&Endpoint::Stop).await
    }

    pub async fn cameras(&self) -> Result<Vec<CardItem>> {
        self.get_json(&Endpoint::ListCameras).await
    }

    pub async fn dataset_videos(&self) -> Result<Vec<CardItem>> {
        self.get_json(&Endpoint::DatasetVideos).await
    }

    pub async fn dataset_info(&self) -> Result<DatasetInfo> {
        self.get_json(&Endpoint::DatasetInfo).await
    }

    pub async fn change_episode(&self, episode: usize) -> Result<Value> {
        self.get_json(&Endpoint::ChangeEpisode(episode)).await
    }

    pub async fn config_paths(&self) -> Result<Vec<String>> {
        self.get_json(&Endpoint::ListConfigPaths).await
    }

    pub async fn calibration_arms(&self) -> Result<Vec<String>> {
        self.get_json(&Endpoint::CalibrationArms).await
    }

    pub async fn connected_camera_ports(&self) -> Result<Vec<CameraPort>> {
        self.get_json(&Endpoint::ConnectedCameraPorts).await
    }

    /// Flat control config object for `mode`. The backend answers unknown
    /// modes with `{"error": ...}` and a 200.
    pub async fn control_config(&self, mode: Mode) -> Result<Map<String, Value>> {
        let config: Map<String, Value> = self.get_json(&Endpoint::ControlConfig(mode)).await?;

        if let Some(error) = config.get("error").and_then(|v| v.as_str()) {
            return Err(Error::Api(format!("Config request failed: {error}")));
        }

        Ok(config)
    }

    /// Sends form fields to a form action path: as a multipart body for POST,
    /// as a query string for GET.
    pub async fn submit_form(
        &self,
        method: Method,
        action: &str,
        fields: Vec<(String, String)>,
    ) -> Result<Response> {
        let request = self.request(method, action)?;

        let request = match method {
            Method::Get => request.query(&fields),
            Method::Post => request.multipart(
                fields
                    .into_iter()
                    .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                        form.text(name, value)
                    }),
            ),
        };

        Ok(request.send().await?)
    }

    pub async fn check_directory(&self, dir_path: &str) -> Result<DirectoryStatus> {
        let endpoint = Endpoint::CheckDirectoryExists;
        let response = self
            .request(endpoint.method(), &endpoint.path())?
            .json(&DirectoryQuery { dir_path })
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    pub async fn keyboard_input(&self, key: &str) -> Result<Option<CommandStatus>> {
        let endpoint = Endpoint::KeyboardInput;
        let response = self
            .request(endpoint.method(), &endpoint.path())?
            .json(&KeyboardInput { data: key })
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        Ok(serde_json::from_slice::<CommandStatus>(&body).ok())
    }

    /// Opens a server-push stream. Messages arrive on the subscription in the
    /// order the backend emits them; a transport error is delivered once and
    /// then the channel closes. Dropping the subscription closes the stream.
    pub async fn subscribe(&self, kind: FeedKind) -> Result<Subscription> {
        let url = self.url(&kind.endpoint().path())?;

        let response = self
            .stream_client
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?;

        info!(feed = %kind, "Subscribed to feed");

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut body = response.bytes_stream();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(feed = %kind, err = ?e, "Feed transport error");
                        let _ = tx.send(Err(Error::Http(e))).await;
                        return;
                    }
                };

                for message in decoder.push(&chunk) {
                    if tx
                        .send(Ok(FeedMessage::decode(kind, message.data)))
                        .await
                        .is_err()
                    {
                        debug!(feed = %kind, "Feed receiver dropped");
                        return;
                    }
                }
            }

            info!(feed = %kind, "Feed closed by backend");
            let _ = tx
                .send(Err(Error::Stream("Stream closed by backend".to_string())))
                .await;
        });

        Ok(Subscription { kind, rx, task })
    }
}

/// Open server-push stream. The reader task is aborted on drop.
#[derive(Debug)]
pub struct Subscription {
    kind: FeedKind,
    rx: mpsc::Receiver<Result<FeedMessage>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub async fn recv(&mut self) -> Option<Result<FeedMessage>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
