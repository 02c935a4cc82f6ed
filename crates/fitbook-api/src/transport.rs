//! Push-event transport abstraction.
//!
//! The realtime channel depends only on this capability set: open an
//! authenticated handle, read a stream of named events, drop the handle to
//! close it. The production implementation speaks WebSocket; tests
//! substitute a scripted transport.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use url::Url;

use crate::error::Error;

// ── Event names ──────────────────────────────────────────────────────

/// Event name for user-facing notifications.
pub const NOTIFICATION_EVENT: &str = "notification";

/// Event name for booking state changes.
pub const BOOKING_UPDATE_EVENT: &str = "booking_update";

// ── PushEvent ────────────────────────────────────────────────────────

/// One named event pushed by the server.
///
/// The payload is handed to listeners unchanged -- this crate does not
/// validate or parse it.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Stream of events from one live transport handle.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<PushEvent, Error>> + Send>>;

// ── EventTransport ───────────────────────────────────────────────────

/// A push-event source the channel can open authenticated handles on.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open a new handle authenticated with `token`.
    ///
    /// Each call produces an independent handle; dropping the returned
    /// stream closes it.
    async fn open(&self, token: &str) -> Result<EventStream, Error>;
}

// ── WsTransport ──────────────────────────────────────────────────────

/// Production transport: WebSocket connection to the booking platform's
/// push endpoint.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: Url,
}

impl WsTransport {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

#[async_trait]
impl EventTransport for WsTransport {
    /// Connect and authenticate via a bearer token on the upgrade request,
    /// then adapt incoming text frames into [`PushEvent`]s.
    async fn open(&self, token: &str) -> Result<EventStream, Error> {
        let uri: tungstenite::http::Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::ChannelConnect(e.to_string()))?;

        let request =
            ClientRequestBuilder::new(uri).with_header("Authorization", format!("Bearer {token}"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::ChannelConnect(e.to_string()))?;

        tracing::debug!(url = %self.url, "realtime transport connected");

        let (_write, mut read) = ws_stream.split();

        let stream = async_stream::stream! {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(tungstenite::Message::Text(text)) => {
                        if let Some(event) = decode_frame(&text) {
                            yield Ok(event);
                        }
                    }
                    Ok(tungstenite::Message::Ping(_)) => {
                        // tungstenite replies with pongs automatically
                        tracing::trace!("realtime ping");
                    }
                    Ok(tungstenite::Message::Close(frame)) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "realtime close frame received"
                            );
                        } else {
                            tracing::info!("realtime close frame received (no payload)");
                        }
                        break;
                    }
                    Ok(_) => {
                        // Binary, Pong, Frame -- ignore
                    }
                    Err(e) => {
                        yield Err(Error::ChannelRead(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Wire envelope for push frames: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Deserialize)]
struct WireFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode a text frame into a [`PushEvent`], skipping anything malformed.
fn decode_frame(text: &str) -> Option<PushEvent> {
    match serde_json::from_str::<WireFrame>(text) {
        Ok(frame) => Some(PushEvent {
            name: frame.event,
            payload: frame.data,
        }),
        Err(e) => {
            tracing::debug!(error = %e, "failed to decode push frame");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
