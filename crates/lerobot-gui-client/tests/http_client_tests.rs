use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use lerobot_gui_client::{
    GuiClient,
    config::BackendConfig,
    endpoints::{Endpoint, Method, RecordEvent},
    events::{FeedKind, FeedMessage, StreamEvent},
    models::Mode,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    headers: String,
    body: String,
}

#[derive(Clone)]
enum Reply {
    Json(u16, String),
    Events(Vec<String>),
    Delayed(Duration, Box<Reply>),
}

type Route = Arc<dyn Fn(&RecordedRequest) -> Reply + Send + Sync>;

struct StubBackend {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl StubBackend {
    async fn start(route: Route) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let route = Arc::clone(&route);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move { handle_conn(stream, route, recorded).await });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    fn client(&self) -> GuiClient {
        GuiClient::new(self.config()).expect("client")
    }

    fn config(&self) -> BackendConfig {
        let address = format!("http://{}", self.addr).parse().expect("stub url");
        BackendConfig::with_address(address)
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock").clone()
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
) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    recorded.lock().expect("lock").push(request.clone());

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
        Reply::Events(chunks) => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
            let _ = stream.write_all(head.as_bytes()).await;
            for chunk in chunks {
                let _ = stream.write_all(chunk.as_bytes()).await;
                let _ = stream.flush().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        Reply::Delayed(..) => unreachable!("delays are unwrapped above"),
    }
    let _ = stream.shutdown().await;
}

fn json(body: &str) -> Reply {
    Reply::Json(200, body.to_string())
}

#[tokio::test]
async fn test_cameras_and_config_paths() {
    let backend = StubBackend::start(Arc::new(|req| match req.path.as_str() {
        "/robot/cameras" => json(
            r#"[{"id": 0, "name": "front", "video_url": "/robot/get-cam-feed/observation.images.front"}]"#,
        ),
        "/robot/configs-path" => json(r#"["lerobot/configs/robot/so100.yaml"]"#),
        _ => Reply::Json(404, "{}".to_string()),
    }))
    .await;
    let client = backend.client();

    let cameras = client.cameras().await.expect("cameras");
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].name, "front");

    let paths = client.config_paths().await.expect("paths");
    assert_eq!(paths, vec!["lerobot/configs/robot/so100.yaml".to_string()]);
}

#[tokio::test]
async fn test_calibration_outlives_request_timeout() {
    let backend = StubBackend::start(Arc::new(|_| {
        Reply::Delayed(Duration::from_millis(400), Box::new(json("true")))
    }))
    .await;
    let config = BackendConfig {
        request_timeout: Duration::from_millis(100),
        ..backend.config()
    };
    let client = GuiClient::new(config).expect("client");

    let status = client
        .command(&Endpoint::CalibrateArm("main_follower".into()))
        .await
        .expect("calibration answered after the request timeout");
    assert_eq!(status, None);

    let err = client
        .command(&Endpoint::Stop)
        .await
        .expect_err("regular commands keep the request timeout");
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_command_tolerates_non_status_bodies() {
    let backend = StubBackend::start(Arc::new(|req| match req.path.as_str() {
        "/select_mode/record" => json(r#"{"status": "fail"}"#),
        "/robot/calibrate/left" => json("true"),
        "/robot/record/event/start" => json(r#"{"status": "success"}"#),
        _ => Reply::Json(500, "{}".to_string()),
    }))
    .await;
    let client = backend.client();

    let status = client.select_mode(Mode::Record).await.expect("select");
    assert_eq!(status.map(|s| s.is_success()), Some(false));

    let status = client
        .command(&Endpoint::CalibrateArm("left".into()))
        .await
        .expect("calibrate");
    assert_eq!(status, None);

    let status = client
        .command(&Endpoint::RecordEvent(RecordEvent::Start))
        .await
        .expect("record");
    assert!(status.expect("status").is_success());

    let err = client.stop().await.expect_err("stop should be rejected");
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));

    let paths: Vec<_> = backend.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "/select_mode/record",
            "/robot/calibrate/left",
            "/robot/record/event/start",
            "/robot/stop",
        ]
    );
}

#[tokio::test]
async fn test_control_config_error_body() {
    let backend = StubBackend::start(Arc::new(|req| match req.path.as_str() {
        "/robot/get-control-config/teleop" => {
            json(r#"{"fps": 30, "robot_config": "lerobot/configs/robot/so100.yaml"}"#)
        }
        _ => json(r#"{"error": "Invalid mode: replay"}"#),
    }))
    .await;
    let client = backend.client();

    let config = client.control_config(Mode::Teleop).await.expect("config");
    assert_eq!(config.get("fps").and_then(|v| v.as_i64()), Some(30));

    let err = client
        .control_config(Mode::Replay)
        .await
        .expect_err("error body");
    assert!(err.to_string().contains("Invalid mode"));
}

#[tokio::test]
async fn test_check_directory_and_keyboard_bodies() {
    let backend = StubBackend::start(Arc::new(|req| match req.path.as_str() {
        "/api/check-directory-exists" => json(r#"{"exists": true}"#),
        _ => json(r#"{"status": "success"}"#),
    }))
    .await;
    let client = backend.client();

    let status = client.check_directory("data/test").await.expect("check");
    assert!(status.exists);

    client.keyboard_input("ArrowRight").await.expect("key");

    let requests = backend.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].body, r#"{"dir_path":"data/test"}"#);
    assert_eq!(requests[1].path, "/api/event/keyboard-input");
    assert_eq!(requests[1].body, r#"{"data":"ArrowRight"}"#);
}

#[tokio::test]
async fn test_submit_form_multipart() {
    let backend = StubBackend::start(Arc::new(|_| json(r#"{"status": "success"}"#))).await;
    let client = backend.client();

    let response = client
        .submit_form(
            Method::Post,
            "/robot/telop/config-update",
            vec![
                ("robot_config".to_string(), "so100.yaml".to_string()),
                ("fps".to_string(), "30".to_string()),
            ],
        )
        .await
        .expect("submit");
    assert!(response.status().is_success());

    let request = &backend.requests()[0];
    assert_eq!(request.path, "/robot/telop/config-update");
    assert!(request.headers.to_lowercase().contains("multipart/form-data"));
    assert!(request.body.contains("name=\"robot_config\""));
    assert!(request.body.contains("so100.yaml"));
    assert!(request.body.contains("name=\"fps\""));
}

#[tokio::test]
async fn test_subscribe_delivers_events_in_order_then_closes() {
    let backend = StubBackend::start(Arc::new(|_| {
        Reply::Events(vec![
            "data: INFO first\n\n".to_string(),
            "data: INFO sec".to_string(),
            "ond\n\n: comment\n\n".to_string(),
            "data: --- Streaming ended ---\n\n".to_string(),
        ])
    }))
    .await;
    let client = backend.client();

    let mut subscription = client.subscribe(FeedKind::Logs).await.expect("subscribe");
    assert_eq!(subscription.kind(), FeedKind::Logs);

    let mut lines = Vec::new();
    let closed_with_error = loop {
        match subscription.recv().await {
            Some(Ok(FeedMessage::Event(StreamEvent::Line(line)))) => lines.push(line),
            Some(Ok(other)) => panic!("unexpected message {other:?}"),
            Some(Err(_)) => break true,
            None => break false,
        }
    };

    assert_eq!(
        lines,
        vec!["INFO first", "INFO second", "--- Streaming ended ---"]
    );
    assert!(closed_with_error, "end of body is reported as a stream error");

    let request = &backend.requests()[0];
    assert_eq!(request.path, "/robot/stream-logs");
    assert!(request.headers.to_lowercase().contains("text/event-stream"));
}

#[tokio::test]
async fn test_subscribe_structured_feed_flags_malformed_payloads() {
    let backend = StubBackend::start(Arc::new(|_| {
        Reply::Events(vec![
            "data: [{\"joint\": \"gripper\", \"state\": 0.5, \"action\": 0.25}]\n\n".to_string(),
            "data: not json\n\n".to_string(),
        ])
    }))
    .await;
    let client = backend.client();

    let mut subscription = client
        .subscribe(FeedKind::StateAction)
        .await
        .expect("subscribe");

    let first = subscription.recv().await.expect("first").expect("ok");
    assert!(matches!(first, FeedMessage::Event(StreamEvent::Joints(ref j)) if j.len() == 1));

    let second = subscription.recv().await.expect("second").expect("ok");
    assert!(matches!(second, FeedMessage::Malformed { ref data, .. } if data == "not json"));
}

#[tokio::test]
async fn test_subscribe_rejected_stream() {
    let backend = StubBackend::start(Arc::new(|_| Reply::Json(503, "{}".to_string()))).await;
    let client = backend.client();

    let err = client
        .subscribe(FeedKind::Logs)
        .await
        .expect_err("rejected subscription");
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
}
