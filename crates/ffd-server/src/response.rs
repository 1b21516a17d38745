//! Minimal HTTP/1.1 response encoding.
//!
//! Every response is JSON, declares its length, and announces
//! `Connection: close`: a worker answers exactly once and then closes.

use ffd_types::LocationSummary;
use serde::Serialize;
use tracing::error;

/// Response statuses the server can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200: ranked results follow.
    Ok,
    /// 400: malformed request line or query.
    BadRequest,
    /// 408: the peer stalled before finishing its request.
    RequestTimeout,
    /// 413: the request head overflowed the request buffer.
    PayloadTooLarge,
    /// 500: the record store failed.
    InternalServerError,
}

impl Status {
    /// Numeric status code.
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::RequestTimeout => 408,
            Self::PayloadTooLarge => 413,
            Self::InternalServerError => 500,
        }
    }

    /// Reason phrase for the status line.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::RequestTimeout => "Request Timeout",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

/// Success body: `{"locations": [...]}`.
#[derive(Debug, Serialize)]
struct LocationsBody<'a> {
    locations: &'a [LocationSummary],
}

/// A complete response ready to be written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    body: String,
}

impl Response {
    /// Serialize `value` as the body of a response with `status`.
    ///
    /// Falls back to an empty 500 if serialization fails.
    pub fn json<T: Serialize>(status: Status, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => {
                error!(error = %e, "failed to serialize response body");
                Self {
                    status: Status::InternalServerError,
                    body: String::new(),
                }
            }
        }
    }

    /// A 200 response listing ranked locations.
    pub fn locations(locations: &[LocationSummary]) -> Self {
        Self::json(Status::Ok, &LocationsBody { locations })
    }

    /// The response status.
    pub const fn status(&self) -> Status {
        self.status
    }

    /// The response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Encode status line, headers, and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n",
            self.status.code(),
            self.status.reason(),
            self.body.len(),
        );
        let mut bytes = Vec::with_capacity(head.len().saturating_add(self.body.len()));
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(self.body.as_bytes());
        bytes
    }
}
