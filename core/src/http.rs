//! Plain-data view of an HTTP response.
//!
//! # Design
//! The transport turns whatever its client library returns into an
//! `HttpResponse` and then asks it for the body. Status interpretation lives
//! here rather than in the transport so it can be tested without a socket.

use crate::error::TransportError;

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Return the body of a 2xx response; any other status is a transport
    /// failure, even when the body happens to be JSON.
    pub fn into_body(self) -> Result<String, TransportError> {
        if self.is_success() {
            return Ok(self.body);
        }
        Err(TransportError::Status {
            status: self.status,
            body: self.body,
        })
    }
}
