// ── Session lifecycle ──
//
// The process-wide owner of the realtime channel. Construct once at app
// start, connect after login, disconnect on logout, reuse for the next
// login. Consumers receive the session (or its channel) by injection --
// there is no hidden global instance.

use std::sync::Arc;

use fitbook_api::channel::{ConnectionState, RealtimeChannel, ReconnectPolicy};
use fitbook_api::transport::{EventTransport, WsTransport};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::debug;

use crate::config::SessionConfig;
use crate::notify::{Notification, NotificationSink, Severity};

/// A client session and its realtime channel.
pub struct Session {
    channel: RealtimeChannel,
}

impl Session {
    /// Build a session over the production WebSocket transport.
    pub fn new(config: &SessionConfig) -> Self {
        let transport = Arc::new(WsTransport::new(config.realtime_url.clone()));
        Self::with_transport(transport, config.reconnect.clone())
    }

    /// Build a session over a caller-supplied transport.
    pub fn with_transport(transport: Arc<dyn EventTransport>, reconnect: ReconnectPolicy) -> Self {
        Self {
            channel: RealtimeChannel::new(transport, reconnect),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the push channel for an authenticated user.
    pub fn login(&self, token: &str) {
        self.channel.connect(token);
    }

    /// Tear down the push channel. Safe to call repeatedly; the session
    /// stays usable for the next login.
    pub fn logout(&self) {
        self.channel.disconnect();
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The realtime channel, for registering event listeners.
    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    /// Observe channel connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.state()
    }

    // ── Push-notification forwarding ─────────────────────────────────

    /// Forward server-pushed `notification` events into `sink`.
    ///
    /// Payloads look like `{"severity": "info", "message": "..."}`;
    /// severity defaults to `info` and malformed payloads are skipped.
    pub fn forward_notifications(&self, sink: Arc<dyn NotificationSink>) {
        self.channel.on_notification(move |payload| {
            let Some(notification) = decode_notification(payload) else {
                return;
            };
            if let Err(e) = sink.notify(notification) {
                tracing::warn!(error = %e, "push notification dispatch failed (non-fatal)");
            }
        });
    }
}

// ── Payload decoding ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct NotificationPayload {
    message: String,
    #[serde(default = "default_severity")]
    severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Info
}

fn decode_notification(payload: &serde_json::Value) -> Option<Notification> {
    match serde_json::from_value::<NotificationPayload>(payload.clone()) {
        Ok(decoded) => Some(Notification {
            severity: decoded.severity,
            message: decoded.message,
        }),
        Err(e) => {
            debug!(error = %e, "failed to decode push notification payload");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_full_payload() {
        let payload = json!({"severity": "success", "message": "Booking confirmed"});
        let notification = decode_notification(&payload).expect("should decode");
        assert_eq!(notification.severity, Severity::Success);
        assert_eq!(notification.message, "Booking confirmed");
    }

    #[test]
    fn decode_defaults_severity_to_info() {
        let payload = json!({"message": "Schedule updated"});
        let notification = decode_notification(&payload).expect("should decode");
        assert_eq!(notification.severity, Severity::Info);
    }

    #[test]
    fn decode_rejects_payloads_without_a_message() {
        assert!(decode_notification(&json!({"severity": "error"})).is_none());
        assert!(decode_notification(&json!("just a string")).is_none());
        assert!(decode_notification(&serde_json::Value::Null).is_none());
    }
}
