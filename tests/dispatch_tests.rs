mod common;

use std::sync::Arc;

use lerobot_gui_client::{
    endpoints::{Endpoint, RecordEvent},
    models::{CommandStatus, Mode},
};
use lerobot_panel::{
    dispatch::{CommandDispatcher, Outcome},
    notify::{CollectingNotifier, Severity},
};

use common::{StubBackend, delayed, json, status};

fn dispatcher(backend: &StubBackend) -> (CommandDispatcher, Arc<CollectingNotifier>) {
    let notifier = Arc::new(CollectingNotifier::new());
    (
        CommandDispatcher::new(backend.client(), notifier.clone()),
        notifier,
    )
}

#[tokio::test]
async fn test_select_mode() {
    let backend = StubBackend::start(|_| json(r#"{"status": "success"}"#)).await;
    let (dispatcher, notifier) = dispatcher(&backend);

    let outcome = dispatcher.dispatch(&Endpoint::SelectMode(Mode::HgDagger)).await;
    assert_eq!(
        outcome,
        Outcome::Completed {
            status: Some(CommandStatus {
                status: "success".into()
            })
        }
    );
    assert_eq!(backend.paths(), vec!["/select_mode/hg_dagger"]);
    assert_eq!(backend.requests()[0].method, "GET");
    assert!(notifier.drain().is_empty());
}

#[tokio::test]
async fn test_rejected_command_alerts() {
    let backend = StubBackend::start(|_| status(409)).await;
    let (dispatcher, notifier) = dispatcher(&backend);

    let outcome = dispatcher.dispatch(&Endpoint::Reset).await;
    assert!(matches!(outcome, Outcome::Rejected(s) if s.as_u16() == 409));

    let notifications = notifier.drain();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].blocking);
    assert_eq!(notifications[0].severity, Severity::Error);
    assert!(notifications[0].message.contains("/robot/reset"));
}

#[tokio::test]
async fn test_failed_status_is_completed_with_notice() {
    let backend = StubBackend::start(|_| json(r#"{"status": "fail"}"#)).await;
    let (dispatcher, notifier) = dispatcher(&backend);

    let outcome = dispatcher.dispatch(&Endpoint::HomeRobot).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.to_string(), "ok (fail)");

    let notifications = notifier.drain();
    assert_eq!(notifications.len(), 1);
    assert!(!notifications[0].blocking);
}

#[tokio::test]
async fn test_bare_answer_completes_without_status() {
    let backend = StubBackend::start(|_| json("true")).await;
    let (dispatcher, _) = dispatcher(&backend);

    let outcome = dispatcher
        .dispatch(&Endpoint::RecordEvent(RecordEvent::Finish))
        .await;
    assert_eq!(outcome, Outcome::Completed { status: None });
    assert_eq!(backend.paths(), vec!["/robot/record/event/finish"]);
}

#[tokio::test]
async fn test_overlapping_commands_are_not_coalesced() {
    let backend =
        StubBackend::start(|_| delayed(50, json(r#"{"status": "success"}"#))).await;
    let (dispatcher, _) = dispatcher(&backend);

    let first = dispatcher.spawn(Endpoint::Stop);
    let second = dispatcher.spawn(Endpoint::Stop);

    assert!(first.await.expect("first").is_success());
    assert!(second.await.expect("second").is_success());
    assert_eq!(backend.paths(), vec!["/robot/stop", "/robot/stop"]);
}

#[tokio::test]
async fn test_send_key_posts_json() {
    let backend = StubBackend::start(|_| json(r#"{"status": "success"}"#)).await;
    let (dispatcher, _) = dispatcher(&backend);

    assert!(dispatcher.send_key("ArrowRight").await.is_success());

    let request = &backend.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/event/keyboard-input");
    assert_eq!(request.body, r#"{"data":"ArrowRight"}"#);
}
