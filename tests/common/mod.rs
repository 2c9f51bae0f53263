#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use lerobot_gui_client::{GuiClient, config::BackendConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinHandle,
};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, String),
    /// Server-sent events, one chunk per write. The connection is closed
    /// afterwards unless `hold_open` is set.
    Events { chunks: Vec<String>, hold_open: bool },
    Delayed(Duration, Box<Reply>),
}

pub fn json(body: &str) -> Reply {
    Reply::Json(200, body.to_string())
}

pub fn status(code: u16) -> Reply {
    Reply::Json(code, "{}".to_string())
}

pub fn events(chunks: &[&str]) -> Reply {
    Reply::Events {
        chunks: chunks.iter().map(|c| c.to_string()).collect(),
        hold_open: false,
    }
}

pub fn open_events(chunks: &[&str]) -> Reply {
    Reply::Events {
        chunks: chunks.iter().map(|c| c.to_string()).collect(),
        hold_open: true,
    }
}

pub fn delayed(millis: u64, reply: Reply) -> Reply {
    Reply::Delayed(Duration::from_millis(millis), Box::new(reply))
}

pub fn sse(data: &str) -> String {
    format!("data: {data}\n\n")
}

pub type Route = Arc<dyn Fn(&RecordedRequest) -> Reply + Send + Sync>;

/// Minimal HTTP/1.1 backend on a random local port.
pub struct StubBackend {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    count: Arc<watch::Sender<usize>>,
    handle: JoinHandle<()>,
}

impl StubBackend {
    pub async fn start(route: impl Fn(&RecordedRequest) -> Reply + Send + Sync + 'static) -> Self {
        let route: Route = Arc::new(route);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(watch::channel(0).0);

        let recorded = Arc::clone(&requests);
        let counter = Arc::clone(&count);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let route = Arc::clone(&route);
                let recorded = Arc::clone(&recorded);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { handle_conn(stream, route, recorded, counter).await });
            }
        });

        Self {
            addr,
            requests,
            count,
            handle,
        }
    }

    pub fn client(&self) -> GuiClient {
        GuiClient::new(BackendConfig::with_address(self.url())).expect("client")
    }

    pub fn url(&self) -> url::Url {
        format!("http://{}", self.addr).parse().expect("stub url")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    /// Waits until at least `n` requests have been received.
    pub async fn wait_for_requests(&self, n: usize) {
        let mut rx = self.count.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|count| *count >= n))
            .await
            .expect("requests in time")
            .expect("stub running");
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split(' ');
    Some(RecordedRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        headers: head.clone(),
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    })
}

async fn handle_conn(
    mut stream: TcpStream,
    route: Route,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    counter: Arc<watch::Sender<usize>>,
) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    recorded.lock().expect("lock").push(request.clone());
    counter.send_modify(|count| *count += 1);

    let mut reply = route(&request);
    while let Reply::Delayed(delay, inner) = reply {
        tokio::time::sleep(delay).await;
        reply = *inner;
    }

    match reply {
        Reply::Json(status, body) => {
            let response = format!(
                "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
        }
        Reply::Events { chunks, hold_open } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
            let _ = stream.write_all(head.as_bytes()).await;
            for chunk in chunks {
                if stream.write_all(chunk.as_bytes()).await.is_err() {
                    return;
                }
                let _ = stream.flush().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if hold_open {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        }
        Reply::Delayed(..) => unreachable!("delays are unwrapped above"),
    }
    let _ = stream.shutdown().await;
}

/// Value of one field in a multipart body.
pub fn multipart_field(body: &str, name: &str) -> Option<String> {
    let marker = format!("name=\"{name}\"");
    let start = body.find(&marker)? + marker.len();
    let value_start = body[start..].find("\r\n\r\n")? + start + 4;
    let value_end = body[value_start..].find("\r\n--")? + value_start;
    Some(body[value_start..value_end].to_string())
}
