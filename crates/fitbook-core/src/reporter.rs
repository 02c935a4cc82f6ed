// ── Error reporter ──
//
// Bridges a raised failure to local error state and a user-visible
// notification. One instance per logical operation or call site -- the
// stored error is a single slot, replaced on every report.

use std::sync::Arc;

use fitbook_api::error::{ApiError, ApiFailure};
use tracing::warn;

use crate::notify::{Notification, NotificationSink, Severity};

/// Fixed message for connection-level failures.
pub const NETWORK_MESSAGE: &str = "Network error. Please check your internet connection.";

/// Fixed message for HTTP 401.
pub const AUTHENTICATION_MESSAGE: &str = "Please log in to continue.";

/// Fixed message for HTTP 403.
pub const AUTHORIZATION_MESSAGE: &str = "You do not have permission to perform this action.";

// ── Options ──────────────────────────────────────────────────────────

/// Recognized reporter options.
#[derive(Debug, Clone)]
pub struct ReporterOptions {
    /// Emit a notification for each reported failure. Default: true.
    pub show_notification: bool,

    /// Hand the original failure back as `Err` after local handling, for
    /// callers that need to abort a larger operation. Default: false.
    pub rethrow: bool,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            show_notification: true,
            rethrow: false,
        }
    }
}

// ── ErrorReporter ────────────────────────────────────────────────────

/// Per-call-site failure handler: classifies, records, notifies.
pub struct ErrorReporter {
    sink: Arc<dyn NotificationSink>,
    options: ReporterOptions,
    last_error: Option<ApiError>,
}

impl ErrorReporter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_options(sink, ReporterOptions::default())
    }

    pub fn with_options(sink: Arc<dyn NotificationSink>, options: ReporterOptions) -> Self {
        Self {
            sink,
            options,
            last_error: None,
        }
    }

    /// Handle a failure: classify it, store it as the current error, and
    /// (by default) notify the user.
    ///
    /// Returns the classified record, or -- when `rethrow` is set -- the
    /// original failure as `Err` so callers can propagate it with `?`.
    /// Side effects always complete before the rethrow, and the classified
    /// record stays readable via [`last_error`](Self::last_error) either way.
    pub fn report(&mut self, failure: ApiFailure) -> Result<ApiError, ApiFailure> {
        let api_error = failure.classify();
        self.last_error = Some(api_error.clone());

        if self.options.show_notification {
            let notification = notification_for(&failure, &api_error);
            if let Err(e) = self.sink.notify(notification) {
                // The sink must never mask the classified outcome.
                warn!(error = %e, "notification dispatch failed (non-fatal)");
            }
        }

        if self.options.rethrow {
            return Err(failure);
        }
        Ok(api_error)
    }

    /// The most recently reported error, if any.
    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    /// Forget the current error. No other side effects.
    pub fn clear(&mut self) {
        self.last_error = None;
    }
}

/// Severity and message selection.
///
/// Auth failures warn (the user can fix them); everything else is an
/// error. Network and auth categories get fixed wording, the rest surface
/// the classified message verbatim.
fn notification_for(failure: &ApiFailure, api_error: &ApiError) -> Notification {
    let severity = if failure.is_authentication_error() || failure.is_authorization_error() {
        Severity::Warning
    } else {
        Severity::Error
    };

    let message = if failure.is_network_error() {
        NETWORK_MESSAGE.to_owned()
    } else if failure.is_authentication_error() {
        AUTHENTICATION_MESSAGE.to_owned()
    } else if failure.is_authorization_error() {
        AUTHORIZATION_MESSAGE.to_owned()
    } else {
        api_error.message.clone()
    };

    Notification { severity, message }
}

// ── Tests ────────────────────────────────────────────────────────────
