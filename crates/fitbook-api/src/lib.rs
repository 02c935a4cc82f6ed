// fitbook-api: failure classification and realtime push channel for the
// Fitbook booking platform.

pub mod channel;
pub mod error;
pub mod transport;

pub use channel::{ConnectionState, RealtimeChannel, ReconnectPolicy};
pub use error::{ApiError, ApiFailure, Error, collapse_validation_errors};
pub use transport::{EventTransport, PushEvent, WsTransport};
