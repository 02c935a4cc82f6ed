// ── Runtime session configuration ──
//
// Describes *where* the realtime channel connects and how it retries.
// The app shell constructs one and hands it in -- core never reads
// config files.

use fitbook_api::channel::ReconnectPolicy;
use url::Url;

/// Configuration for a client session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Push-event endpoint (e.g. `wss://api.fitbook.example/realtime`).
    pub realtime_url: Url,

    /// Reconnect behavior for the push channel.
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            realtime_url: "ws://127.0.0.1:4000/realtime".parse().unwrap(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
