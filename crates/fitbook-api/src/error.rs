use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// Message used when nothing else can describe a failure.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

// ── Crate error type ─────────────────────────────────────────────────

/// Top-level error type for the `fitbook-api` crate.
///
/// Covers failures of the crate's own machinery (the realtime channel and
/// its transport). Failures *being classified* are [`ApiFailure`] values,
/// not this type.
#[derive(Debug, Error)]
pub enum Error {
    /// Opening the realtime transport failed.
    #[error("realtime connection failed: {0}")]
    ChannelConnect(String),

    /// The realtime stream failed mid-read.
    #[error("realtime stream error: {0}")]
    ChannelRead(String),
}

// ── ApiError ─────────────────────────────────────────────────────────

/// Normalized failure record surfaced to consumers.
///
/// Built from any [`ApiFailure`] via [`classify`](ApiFailure::classify);
/// construction is total and the message is always non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Human-readable description.
    pub message: String,
    /// Machine-readable category or identifier, when known.
    pub code: Option<String>,
    /// Extra diagnostic payload; shape not enforced.
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Build a record carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
        }
    }

    /// Build a record with a message and a code.
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
            details: None,
        }
    }

    fn fallback() -> Self {
        Self::new(FALLBACK_MESSAGE)
    }
}

// ── HTTP error body ──────────────────────────────────────────────────

/// Structured error body the booking API returns on non-2xx responses.
///
/// Every field is optional -- bodies are parsed leniently and anything
/// missing just falls through to the transport-level defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Field name → ordered validation messages.
    #[serde(default)]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

// ── Failure taxonomy ─────────────────────────────────────────────────

/// HTTP-level failure shape produced by the REST layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportFailure {
    /// Connection-level failure -- no response was received at all.
    #[error("no response received: {reason}")]
    NoResponse { reason: String },

    /// The server responded with a non-success status.
    #[error("HTTP {status}")]
    Status { status: u16, body: Option<ErrorBody> },
}

/// Closed set of recognized failure inputs.
///
/// Anything an operation can raise is expressed as one of these variants
/// before classification; there is no duck typing at runtime. Unrecognized
/// values belong in [`Unknown`](Self::Unknown).
#[derive(Debug, Error)]
pub enum ApiFailure {
    /// Application-raised error carrying a prebuilt record.
    #[error("{}", .0.message)]
    Application(ApiError),

    /// Failure from the HTTP transport.
    #[error(transparent)]
    Transport(#[from] TransportFailure),

    /// Generic error value exposing only a message.
    #[error("{0}")]
    Other(String),

    /// Unrecognized failure.
    #[error("{FALLBACK_MESSAGE}")]
    Unknown,
}

impl ApiFailure {
    // ── Classification ───────────────────────────────────────────────

    /// Normalize any failure into an [`ApiError`].
    ///
    /// Total: every variant maps to a record, and the record's message is
    /// never empty. Classifying an [`Application`](Self::Application)
    /// failure copies its fields through unchanged.
    pub fn classify(&self) -> ApiError {
        match self {
            Self::Application(err) => ApiError {
                message: or_fallback(err.message.clone()),
                code: err.code.clone(),
                details: err.details.clone(),
            },
            Self::Transport(TransportFailure::Status { status, body }) => {
                let body = body.as_ref();
                ApiError {
                    message: body
                        .and_then(|b| b.message.clone())
                        .map(or_fallback)
                        .unwrap_or_else(|| status_message(*status)),
                    code: body.and_then(|b| b.code.clone()),
                    details: body.and_then(|b| b.details.clone()),
                }
            }
            Self::Transport(TransportFailure::NoResponse { reason }) => {
                ApiError::new(or_fallback(reason.clone()))
            }
            Self::Other(message) => ApiError::new(or_fallback(message.clone())),
            Self::Unknown => ApiError::fallback(),
        }
    }

    /// True iff the transport never received a response (connection-level
    /// failure, not an HTTP error status).
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Transport(TransportFailure::NoResponse { .. }))
    }

    /// True iff the server answered HTTP 401.
    pub fn is_authentication_error(&self) -> bool {
        self.has_status(401)
    }

    /// True iff the server answered HTTP 403.
    pub fn is_authorization_error(&self) -> bool {
        self.has_status(403)
    }

    /// True iff the server answered HTTP 422.
    pub fn is_validation_error(&self) -> bool {
        self.has_status(422)
    }

    fn has_status(&self, expected: u16) -> bool {
        matches!(
            self,
            Self::Transport(TransportFailure::Status { status, .. }) if *status == expected
        )
    }

    /// Field → ordered validation messages from a 422 body.
    ///
    /// Empty for every other failure, including 422s without a body.
    pub fn validation_errors(&self) -> BTreeMap<String, Vec<String>> {
        match self {
            Self::Transport(TransportFailure::Status {
                status: 422,
                body: Some(body),
            }) => body.errors.clone().unwrap_or_default(),
            _ => BTreeMap::new(),
        }
    }

    // ── Construction from the HTTP layer ─────────────────────────────

    /// Build a transport failure from a non-success HTTP response.
    ///
    /// Reads the body and tries to parse the structured error shape; a
    /// body that isn't valid JSON is preserved as the failure message.
    pub async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let raw = resp.text().await.unwrap_or_default();

        if let Ok(body) = serde_json::from_str::<ErrorBody>(&raw) {
            return Self::Transport(TransportFailure::Status {
                status,
                body: Some(body),
            });
        }

        let body = (!raw.is_empty()).then(|| ErrorBody {
            message: Some(raw),
            ..ErrorBody::default()
        });
        Self::Transport(TransportFailure::Status { status, body })
    }
}

impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Transport(TransportFailure::Status {
                status: status.as_u16(),
                body: None,
            });
        }
        if err.is_connect() || err.is_timeout() {
            return Self::Transport(TransportFailure::NoResponse {
                reason: err.to_string(),
            });
        }
        Self::Other(err.to_string())
    }
}

// ── Validation map collapse ──────────────────────────────────────────

/// Keep the first message per field; fields with no messages are dropped.
pub fn collapse_validation_errors(
    errors: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, String> {
    errors
        .iter()
        .filter_map(|(field, messages)| messages.first().map(|m| (field.clone(), m.clone())))
        .collect()
}

// ── Helpers ──────────────────────────────────────────────────────────

fn or_fallback(message: String) -> String {
    if message.trim().is_empty() {
        FALLBACK_MESSAGE.to_owned()
    } else {
        message
    }
}

fn status_message(status: u16) -> String {
    format!("HTTP {status}")
}

// ── Tests ────────────────────────────────────────────────────────────
