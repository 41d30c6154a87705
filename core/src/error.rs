//! Error types for the earthquake fetch pipeline.
//!
//! # Design
//! Transport and formatting failures are kept apart so tests and callers can
//! tell them apart, but neither ever reaches the presentation layer as a
//! structured value: `RequestCoordinator` renders a `RequestError` with
//! `Display` and publishes the resulting string.

use thiserror::Error;

/// The GET request did not produce a usable response body.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout or protocol error.
    #[error("{0}")]
    Request(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be read as text.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The fetch task panicked or was cancelled before completing.
    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

/// The response body is not valid JSON.
#[derive(Debug, Error)]
#[error("malformed JSON: {0}")]
pub struct FormatError(#[from] pub serde_json::Error);

/// Failure of one submitted request, as published to observers.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Network request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Response formatting failed: {0}")]
    Format(#[from] FormatError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_message_carries_prefix_and_cause() {
        let err = RequestError::from(TransportError::Request("Connection refused".to_string()));
        assert_eq!(err.to_string(), "Network request failed: Connection refused");
    }

    #[test]
    fn status_failure_message_includes_status_and_body() {
        let err = RequestError::from(TransportError::Status {
            status: 503,
            body: "unavailable".to_string(),
        });
        assert_eq!(err.to_string(), "Network request failed: HTTP 503: unavailable");
    }

    #[test]
    fn format_failure_message_has_its_own_prefix() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RequestError::from(FormatError(json_err));
        let message = err.to_string();
        assert!(message.starts_with("Response formatting failed: malformed JSON: "), "{message}");
    }
}
