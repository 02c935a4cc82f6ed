//! Realtime push channel with auto-reconnect.
//!
//! One authenticated connection per session, delivering named events to
//! registered listeners. Listeners are owned by the channel, not the
//! transport handle, so registrations made at any time apply to every
//! handle the channel opens -- including after a reconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fitbook_api::channel::{RealtimeChannel, ReconnectPolicy};
//! use fitbook_api::transport::WsTransport;
//!
//! let transport = Arc::new(WsTransport::new("wss://api.example/realtime".parse()?));
//! let channel = RealtimeChannel::new(transport, ReconnectPolicy::default());
//!
//! channel.on_booking_update(|payload| println!("booking changed: {payload}"));
//! channel.connect("session-token");
//! // ... later, on logout:
//! channel.disconnect();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{BOOKING_UPDATE_EVENT, EventStream, EventTransport, NOTIFICATION_EVENT, PushEvent};

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Retry policy for the reconnect loop: a bounded number of attempts with
/// a fixed delay between them. Exhausting the bound leaves the channel
/// disconnected -- it never retries silently forever.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Reconnection attempts after a failed or dropped connection. Default: 5.
    pub max_attempts: u32,

    /// Delay between attempts. Default: 1s.
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

// ── RealtimeChannel ──────────────────────────────────────────────────

type Listener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Persistent authenticated push-event connection.
///
/// Cheaply cloneable; all clones share one underlying connection. At most
/// one transport handle is live at a time -- [`connect`](Self::connect)
/// tears down the previous handle before opening the next.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    transport: Arc<dyn EventTransport>,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    /// Cancellation token for the currently live handle, if any.
    handle_cancel: Mutex<Option<CancellationToken>>,
}

impl RealtimeChannel {
    pub fn new(transport: Arc<dyn EventTransport>, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                policy,
                state,
                listeners: Mutex::new(HashMap::new()),
                handle_cancel: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the push connection authenticated with `token`.
    ///
    /// Returns immediately; outcomes arrive through [`state`](Self::state)
    /// transitions and tracing, never as a synchronous error. If a handle
    /// is already live (connected or connecting), it is torn down first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, token: &str) {
        let cancel = CancellationToken::new();
        {
            let mut guard = lock(&self.inner.handle_cancel);
            if let Some(previous) = guard.replace(cancel.clone()) {
                previous.cancel();
            }
        }

        let inner = Arc::clone(&self.inner);
        let token = token.to_owned();
        tokio::spawn(async move {
            run_loop(&inner, &token, &cancel).await;
        });
    }

    /// Close the current handle, if any. Idempotent -- calling this twice
    /// or on an already-disconnected channel is a no-op.
    ///
    /// Events the old handle delivers after this call are dropped before
    /// listener dispatch.
    pub fn disconnect(&self) {
        if let Some(cancel) = lock(&self.inner.handle_cancel).take() {
            cancel.cancel();
        }
        let _ = self.inner.state.send(ConnectionState::Disconnected);
    }

    // ── Listener registration ────────────────────────────────────────

    /// Register `listener` for every future occurrence of `event`.
    ///
    /// Listeners for a name fire in registration order. Registering before
    /// the first connect is fine; registrations survive reconnects.
    pub fn on(&self, event: &str, listener: impl Fn(&serde_json::Value) + Send + Sync + 'static) {
        lock(&self.inner.listeners)
            .entry(event.to_owned())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Subscribe to `notification` events.
    pub fn on_notification(&self, listener: impl Fn(&serde_json::Value) + Send + Sync + 'static) {
        self.on(NOTIFICATION_EVENT, listener);
    }

    /// Subscribe to `booking_update` events.
    pub fn on_booking_update(&self, listener: impl Fn(&serde_json::Value) + Send + Sync + 'static) {
        self.on(BOOKING_UPDATE_EVENT, listener);
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// The connection state right now.
    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }
}

// ── Run loop ─────────────────────────────────────────────────────────

/// Open → dispatch → on failure or drop, fixed-delay retry up to the bound.
async fn run_loop(inner: &ChannelInner, token: &str, cancel: &CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let _ = inner.state.send(ConnectionState::Connecting);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            opened = inner.transport.open(token) => opened,
        };

        match opened {
            Ok(stream) => {
                let _ = inner.state.send(ConnectionState::Connected);
                info!("realtime channel connected");
                attempt = 0;

                read_events(inner, stream, cancel).await;

                if cancel.is_cancelled() {
                    break;
                }
                info!("realtime connection dropped, reconnecting");
            }
            Err(e) => {
                warn!(error = %e, attempt, "realtime connect failed");
            }
        }

        attempt += 1;
        if attempt > inner.policy.max_attempts {
            warn!(
                max_attempts = inner.policy.max_attempts,
                "realtime reconnection limit reached, giving up"
            );
            let _ = inner.state.send(ConnectionState::Disconnected);
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(inner.policy.retry_delay) => {}
        }
    }

    debug!("realtime loop exiting");
}

/// Drain a live handle, dispatching events until the stream ends, errors,
/// or the handle is cancelled.
async fn read_events(inner: &ChannelInner, mut stream: EventStream, cancel: &CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            item = stream.next() => {
                match item {
                    Some(Ok(event)) => {
                        // A disconnect may have raced the read -- drop late events.
                        if cancel.is_cancelled() {
                            return;
                        }
                        dispatch(inner, &event);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "realtime stream error");
                        return;
                    }
                    None => {
                        info!("realtime stream ended");
                        return;
                    }
                }
            }
        }
    }
}

/// Invoke every listener registered for the event name, in registration
/// order. The registry lock is released before invocation so listeners may
/// register further listeners.
fn dispatch(inner: &ChannelInner, event: &PushEvent) {
    let registered: Vec<Listener> = {
        let listeners = lock(&inner.listeners);
        listeners.get(&event.name).cloned().unwrap_or_default()
    };

    if registered.is_empty() {
        debug!(event = %event.name, "push event with no listeners");
        return;
    }

    for listener in &registered {
        listener(&event.payload);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ────────────────────────────────────────────────────────────
