// End-to-end session tests: login/logout lifecycle and push-notification
// forwarding, against a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;

use fitbook_api::channel::{ConnectionState, ReconnectPolicy};
use fitbook_api::error::Error;
use fitbook_api::transport::{EventStream, EventTransport, PushEvent};
use fitbook_core::{Notification, NotificationSink, Session, Severity, SinkError};

// ── Scripted transport ──────────────────────────────────────────────

type EventTx = mpsc::UnboundedSender<Result<PushEvent, Error>>;

struct ScriptedTransport {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<PushEvent, Error>>>>,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            streams: Mutex::new(VecDeque::new()),
            tokens: Mutex::new(Vec::new()),
        })
    }

    fn accept_next(&self) -> EventTx {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn open(&self, token: &str) -> Result<EventStream, Error> {
        self.tokens.lock().unwrap().push(token.to_owned());
        match self.streams.lock().unwrap().pop_front() {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(Error::ChannelConnect("script exhausted".into())),
        }
    }
}

// ── Recording sink ──────────────────────────────────────────────────

struct ChannelSink(mpsc::UnboundedSender<Notification>);

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) -> Result<(), SinkError> {
        self.0
            .send(notification)
            .map_err(|e| SinkError(e.to_string()))
    }
}

fn sink_pair() -> (Arc<dyn NotificationSink>, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelSink(tx)), rx)
}

// ── Helpers ─────────────────────────────────────────────────────────

fn notification_event(payload: serde_json::Value) -> PushEvent {
    PushEvent {
        name: "notification".into(),
        payload,
    }
}

async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, target: ConnectionState) {
    timeout(Duration::from_secs(5), async {
        while *rx.borrow_and_update() != target {
            rx.changed().await.expect("state channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {target:?}"));
}

async fn recv_notification(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("sink channel closed")
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn forwarded_notifications_reach_the_sink() {
    let transport = ScriptedTransport::new();
    let feed = transport.accept_next();
    let session = Session::with_transport(transport.clone(), ReconnectPolicy::default());

    let (sink, mut notifications) = sink_pair();
    session.forward_notifications(sink);

    let mut state = session.connection_state();
    session.login("member-token");
    wait_for_state(&mut state, ConnectionState::Connected).await;

    feed.send(Ok(notification_event(json!({
        "severity": "warning",
        "message": "Class moved to studio B"
    }))))
    .unwrap();

    let delivered = recv_notification(&mut notifications).await;
    assert_eq!(delivered.severity, Severity::Warning);
    assert_eq!(delivered.message, "Class moved to studio B");
}

#[tokio::test]
async fn malformed_payloads_are_skipped() {
    let transport = ScriptedTransport::new();
    let feed = transport.accept_next();
    let session = Session::with_transport(transport.clone(), ReconnectPolicy::default());

    let (sink, mut notifications) = sink_pair();
    session.forward_notifications(sink);

    let mut state = session.connection_state();
    session.login("member-token");
    wait_for_state(&mut state, ConnectionState::Connected).await;

    // No message field -- silently dropped.
    feed.send(Ok(notification_event(json!({"severity": "error"}))))
        .unwrap();
    // Severity omitted -- defaults to info.
    feed.send(Ok(notification_event(json!({"message": "Schedule updated"}))))
        .unwrap();

    let delivered = recv_notification(&mut notifications).await;
    assert_eq!(delivered.severity, Severity::Info);
    assert_eq!(delivered.message, "Schedule updated");
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn logout_stops_delivery() {
    let transport = ScriptedTransport::new();
    let feed = transport.accept_next();
    let session = Session::with_transport(transport.clone(), ReconnectPolicy::default());

    let (sink, mut notifications) = sink_pair();
    session.forward_notifications(sink);

    let mut state = session.connection_state();
    session.login("member-token");
    wait_for_state(&mut state, ConnectionState::Connected).await;

    session.logout();
    session.logout(); // idempotent
    assert_eq!(session.channel().current_state(), ConnectionState::Disconnected);

    feed.send(Ok(notification_event(json!({"message": "too late"}))))
        .unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn session_is_reusable_after_logout() {
    let transport = ScriptedTransport::new();
    let _first = transport.accept_next();
    let second = transport.accept_next();
    let session = Session::with_transport(transport.clone(), ReconnectPolicy::default());

    let (sink, mut notifications) = sink_pair();
    session.forward_notifications(sink);

    let mut state = session.connection_state();
    session.login("first-login");
    wait_for_state(&mut state, ConnectionState::Connected).await;

    session.logout();
    wait_for_state(&mut state, ConnectionState::Disconnected).await;

    session.login("second-login");
    wait_for_state(&mut state, ConnectionState::Connected).await;

    second
        .send(Ok(notification_event(json!({"message": "Welcome back"}))))
        .unwrap();
    assert_eq!(recv_notification(&mut notifications).await.message, "Welcome back");

    assert_eq!(transport.tokens(), vec!["first-login", "second-login"]);
}
