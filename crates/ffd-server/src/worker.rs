//! Per-connection request handling.
//!
//! A worker owns exactly one accepted connection. It buffers the request
//! head, parses the proximity query, asks the [`ProximityRanker`] for
//! results, writes one response, and closes. Every failure is turned into a
//! response (or, if the peer is gone, into nothing) so that no error ever
//! leaves the worker.
//!
//! Completion bookkeeping is not done here: the registry wraps each worker
//! future in a guard that marks it completed however the future ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use ffd_store::RecordStore;
use ffd_types::LocationSummary;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::buffer::{FillOutcome, RequestBuffer};
use crate::config::FfdConfig;
use crate::error::RequestError;
use crate::ranker::ProximityRanker;
use crate::request::parse_request;
use crate::response::{Response, Status};

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerLimits {
    /// Largest request head accepted, in bytes.
    pub request_capacity: usize,
    /// How long to wait for a complete request head, and again for the
    /// peer to take the response (`None` waits forever).
    pub read_timeout: Option<Duration>,
    /// How long a store query may take.
    pub query_timeout: Duration,
}

impl WorkerLimits {
    /// Limits taken from the daemon configuration.
    pub const fn from_config(config: &FfdConfig) -> Self {
        Self {
            request_capacity: config.server.request_capacity,
            read_timeout: config.server.read_timeout(),
            query_timeout: config.store.query_timeout(),
        }
    }
}

/// Shared, read-only state every worker needs.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    ranker: ProximityRanker,
    limits: WorkerLimits,
    today: fn() -> NaiveDate,
}

impl WorkerContext {
    /// Build a context over `store`.
    pub const fn new(store: Arc<dyn RecordStore>, limits: WorkerLimits) -> Self {
        Self {
            ranker: ProximityRanker::new(store, limits.query_timeout),
            limits,
            today: utc_today,
        }
    }

    /// Replace the source of "today" used for validity windows.
    #[must_use]
    pub const fn with_date_source(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Serve one connection end to end and close it.
///
/// Returns the status of the response delivered, or `None` if the peer went
/// away, or stopped reading, before a response could be handed over.
pub async fn handle_connection<S>(mut stream: S, context: &WorkerContext) -> Option<Status>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = match serve(&mut stream, context).await {
        Ok(Some(locations)) => Some(Response::locations(&locations)),
        Ok(None) => None,
        Err(RequestError::Io(e)) => {
            debug!(error = %e, "connection failed while reading request");
            None
        }
        Err(e) => {
            if let RequestError::Backend(source) = &e {
                warn!(error = %source, "record store query failed");
            }
            Some(e.into_response())
        }
    };

    let delivery = deliver(&mut stream, response.as_ref());
    let delivered = match context.limits.read_timeout {
        Some(limit) => timeout(limit, delivery).await.unwrap_or_else(|_elapsed| {
            debug!(timeout = ?limit, "peer did not take the response in time");
            false
        }),
        None => delivery.await,
    };

    response.filter(|_| delivered).map(|r| r.status())
}

/// Write `response`, if any, and close the write half. `false` if the
/// response could not be written.
async fn deliver<S>(stream: &mut S, response: Option<&Response>) -> bool
where
    S: AsyncWrite + Unpin,
{
    let mut written = true;
    if let Some(response) = response {
        if let Err(e) = stream.write_all(&response.to_bytes()).await {
            debug!(error = %e, "failed to write response");
            written = false;
        }
    }
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "failed to shut down connection");
    }
    written
}

/// Read, parse, and rank. `Ok(None)` means the peer closed without sending.
async fn serve<S>(
    stream: &mut S,
    context: &WorkerContext,
) -> Result<Option<Vec<LocationSummary>>, RequestError>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = RequestBuffer::with_capacity(context.limits.request_capacity);
    let fill = buffer.fill_from(stream);
    let outcome = match context.limits.read_timeout {
        Some(limit) => match timeout(limit, fill).await {
            Ok(outcome) => outcome?,
            Err(_elapsed) => return Err(RequestError::ReadTimeout),
        },
        None => fill.await?,
    };

    let head_len = match outcome {
        FillOutcome::Complete { head_len } => head_len,
        FillOutcome::Overflow => {
            return Err(RequestError::TooLarge {
                capacity: buffer.capacity(),
            });
        }
        FillOutcome::Closed { partial: false } => return Ok(None),
        FillOutcome::Closed { partial: true } => {
            return Err(RequestError::BadRequest(String::from(
                "connection closed mid-request",
            )));
        }
    };

    let query = parse_request(buffer.head(head_len))?;
    let locations = context.ranker.rank(query, (context.today)()).await?;
    Ok(Some(locations))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ffd_store::{MemoryStore, StoreError};
    use ffd_types::{Category, CategoryFilter, Coordinates, GeoRecord, RecordId};
    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn query_nearest(
            &self,
            _filter: CategoryFilter,
            _origin: Coordinates,
            _as_of: NaiveDate,
            _limit: usize,
        ) -> Result<Vec<GeoRecord>, StoreError> {
            Err(StoreError::Unavailable(String::from("connection refused")))
        }
    }

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn limits() -> WorkerLimits {
        WorkerLimits {
            request_capacity: 256,
            read_timeout: Some(Duration::from_secs(5)),
            query_timeout: Duration::from_secs(1),
        }
    }

    fn record(id: u32, lat: f64, category: Category) -> GeoRecord {
        GeoRecord {
            id: RecordId(id),
            name: format!("giveaway {id}"),
            description: String::from("fresh fruit"),
            lat,
            lng: -15.43,
            category,
            start: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
        }
    }

    fn context() -> WorkerContext {
        let store = MemoryStore::from_records(vec![
            record(1, 28.20, Category::Foodbank),
            record(2, 28.15, Category::Foodbank),
            record(3, 28.16, Category::People),
        ])
        .unwrap();
        WorkerContext::new(Arc::new(store), limits()).with_date_source(fixed_today)
    }

    /// Run a worker against `request` and return its status and raw reply.
    async fn exchange(context: WorkerContext, request: &[u8]) -> (Option<Status>, String) {
        let (mut client, server) = tokio::io::duplex(4096);
        let worker = tokio::spawn(async move { handle_connection(server, &context).await });
        client.write_all(request).await.unwrap();
        let status = worker.await.unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        (status, reply)
    }

    fn body(reply: &str) -> serde_json::Value {
        let (_, body) = reply.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn answers_with_ranked_locations() {
        let (status, reply) = exchange(
            context(),
            b"GET /?type=1&lat=28.14&lng=-15.43 HTTP/1.1\r\nHost: x\r\n\r\n",
        )
        .await;

        assert_eq!(status, Some(Status::Ok));
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        let json = body(&reply);
        let ids: Vec<_> = json["locations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(json["locations"][0]["desc"], "fresh fruit");
    }

    #[tokio::test]
    async fn overflow_yields_too_large() {
        let request = vec![b'A'; 1000];
        let (status, reply) = exchange(context(), &request).await;
        assert_eq!(status, Some(Status::PayloadTooLarge));
        assert!(reply.starts_with("HTTP/1.1 413 "));
        assert_eq!(body(&reply)["status"], 413);
    }

    #[tokio::test]
    async fn unknown_method_is_bad_request() {
        let (status, reply) = exchange(context(), b"DELETE /?type=1&lat=1&lng=1 HTTP/1.1\r\n\r\n").await;
        assert_eq!(status, Some(Status::BadRequest));
        assert!(reply.starts_with("HTTP/1.1 400 "));
    }

    #[tokio::test]
    async fn zero_latitude_is_bad_request() {
        let (status, _) = exchange(context(), b"GET /?type=1&lat=0&lng=-15.43 HTTP/1.1\r\n\r\n").await;
        assert_eq!(status, Some(Status::BadRequest));
    }

    #[tokio::test]
    async fn store_failure_is_server_error() {
        let context = WorkerContext::new(Arc::new(BrokenStore), limits());
        let (status, reply) = exchange(context, b"GET /?type=2&lat=1&lng=1 HTTP/1.1\r\n\r\n").await;
        assert_eq!(status, Some(Status::InternalServerError));
        assert_eq!(body(&reply)["error"], "internal error");
    }

    #[tokio::test]
    async fn silent_close_gets_no_response() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let status = handle_connection(server, &context()).await;
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn partial_request_then_close_is_bad_request() {
        let (mut client, server): (DuplexStream, DuplexStream) = tokio::io::duplex(256);
        let context = context();
        let worker = tokio::spawn(async move { handle_connection(server, &context).await });
        client.write_all(b"GET /?type=1").await.unwrap();
        client.shutdown().await.unwrap();
        assert_eq!(worker.await.unwrap(), Some(Status::BadRequest));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_peer_times_out() {
        let (_client, server) = tokio::io::duplex(4096);
        let context = WorkerContext::new(
            Arc::new(MemoryStore::new()),
            WorkerLimits {
                read_timeout: Some(Duration::from_millis(50)),
                ..limits()
            },
        );
        let status = handle_connection(server, &context).await;
        assert_eq!(status, Some(Status::RequestTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn unread_response_is_abandoned_after_timeout() {
        let (mut client, server) = tokio::io::duplex(64);
        let context = WorkerContext::new(
            Arc::new(MemoryStore::new()),
            WorkerLimits {
                read_timeout: Some(Duration::from_millis(50)),
                ..limits()
            },
        );
        let worker = tokio::spawn(async move { handle_connection(server, &context).await });

        // The client sends a full request but never reads the reply, which
        // is larger than the pipe.
        client
            .write_all(b"GET /?type=9&lat=1&lng=1 HTTP/1.1\r\n\r\n")
            .await
            .unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, None);
        drop(client);
    }
}
