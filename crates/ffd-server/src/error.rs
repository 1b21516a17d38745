//! Error types for the connection lifecycle manager.
//!
//! [`RequestError`] covers everything that can go wrong inside a single
//! worker. It never escapes the worker: each variant maps onto a
//! [`Status`] and is rendered into an error response via
//! [`RequestError::into_response`]. [`ServerError`] covers the listener
//! itself and is the only error the daemon sees.

use ffd_store::StoreError;

use crate::response::{Response, Status};

/// Errors that can occur while a worker serves one connection.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The request head did not fit in the request buffer.
    #[error("request exceeds {capacity} bytes")]
    TooLarge {
        /// Buffer capacity that was exhausted.
        capacity: usize,
    },

    /// The request line or query string was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The peer did not finish sending its request in time.
    #[error("timed out waiting for request")]
    ReadTimeout,

    /// The record store failed or timed out.
    #[error("record store error: {0}")]
    Backend(#[from] StoreError),

    /// Reading from the connection failed.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// The response status this error is reported with.
    pub const fn status(&self) -> Status {
        match self {
            Self::TooLarge { .. } => Status::PayloadTooLarge,
            Self::BadRequest(_) => Status::BadRequest,
            Self::ReadTimeout => Status::RequestTimeout,
            Self::Backend(_) | Self::Io(_) => Status::InternalServerError,
        }
    }

    /// Render this error as a JSON error response.
    pub fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Store internals stay in the log.
            Self::Backend(_) | Self::Io(_) => String::from("internal error"),
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.code(),
        });

        Response::json(status, &body)
    }
}

/// Errors that can occur when starting or running the listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind or listen on the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The listener has already been claimed by a running accept loop.
    #[error("listener is not available (accept loop already running)")]
    NotListening,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body_json(response: &Response) -> serde_json::Value {
        serde_json::from_str(response.body()).unwrap()
    }

    #[test]
    fn statuses() {
        assert_eq!(RequestError::TooLarge { capacity: 8 }.status(), Status::PayloadTooLarge);
        assert_eq!(RequestError::BadRequest(String::new()).status(), Status::BadRequest);
        assert_eq!(RequestError::ReadTimeout.status(), Status::RequestTimeout);
        assert_eq!(
            RequestError::Backend(StoreError::Timeout).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn bad_request_body_carries_reason() {
        let response = RequestError::BadRequest(String::from("missing lat")).into_response();
        assert_eq!(response.status(), Status::BadRequest);
        let json = body_json(&response);
        assert_eq!(json["status"], 400);
        assert_eq!(json["error"], "bad request: missing lat");
    }

    #[test]
    fn backend_details_are_not_leaked() {
        let err = RequestError::Backend(StoreError::Unavailable(String::from("db at 10.0.0.3")));
        let json = body_json(&err.into_response());
        assert_eq!(json["error"], "internal error");
        assert_eq!(json["status"], 500);
    }
}
