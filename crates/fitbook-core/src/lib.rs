// fitbook-core: failure reporting and session services for Fitbook clients.

pub mod config;
pub mod notify;
pub mod reporter;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SessionConfig;
pub use notify::{Notification, NotificationSink, Severity, SinkError, TracingSink};
pub use reporter::{ErrorReporter, ReporterOptions};
pub use session::Session;

// Re-export the classification layer so consumers that only handle
// failures need not depend on fitbook-api directly.
pub use fitbook_api::error::{ApiError, ApiFailure, collapse_validation_errors};
