// ── User-facing notifications ──
//
// Ephemeral severity + message records. The core creates them, hands them
// to a sink, and forgets them -- no notification history is kept anywhere.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Success,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Success => "success",
        })
    }
}

/// An ephemeral user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// A sink failed to render or queue a notification.
#[derive(Debug, Error)]
#[error("notification sink failed: {0}")]
pub struct SinkError(pub String);

/// Renders or queues notifications for the user.
///
/// The core makes no assumptions about display duration, stacking, or
/// dismissal -- that is entirely the sink's business.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), SinkError>;
}

/// Sink that writes notifications to the tracing output.
///
/// The default in headless contexts; UI shells supply their own sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) -> Result<(), SinkError> {
        match notification.severity {
            Severity::Error => tracing::error!(message = %notification.message, "notification"),
            Severity::Warning => tracing::warn!(message = %notification.message, "notification"),
            Severity::Info | Severity::Success => tracing::info!(
                severity = %notification.severity,
                message = %notification.message,
                "notification"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_deserializes_from_lowercase() {
        let severity: Severity = serde_json::from_str(r#""warning""#).expect("should parse");
        assert_eq!(severity, Severity::Warning);
        assert!(serde_json::from_str::<Severity>(r#""fatal""#).is_err());
    }

    #[test]
    fn severity_displays_lowercase() {
        assert_eq!(Severity::Success.to_string(), "success");
        assert_eq!(Severity::Error.to_string(), "error");
    }

    #[test]
    fn tracing_sink_accepts_everything() {
        let sink = TracingSink;
        for severity in [Severity::Error, Severity::Warning, Severity::Info, Severity::Success] {
            assert!(sink.notify(Notification::new(severity, "hello")).is_ok());
        }
    }
}
