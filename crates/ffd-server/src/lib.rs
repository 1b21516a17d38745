//! Connection lifecycle manager and proximity query worker.
//!
//! This crate accepts TCP connections, answers one proximity query per
//! connection, and shuts down without abandoning in-flight requests:
//!
//! - **[`Server`]** binds the listener, dispatches each accepted
//!   connection to a worker task, and drains every worker on
//!   [`Server::stop`]
//! - **[`WorkerRegistry`]** tracks live workers and their completion
//!   state; the **reaper** joins and removes finished ones on a fixed
//!   period
//! - **[`worker::handle_connection`]** reads a bounded request head,
//!   parses `GET /?type=..&lat=..&lng=..`, asks the record store for the
//!   nearest matching giveaways, and writes a JSON response
//!
//! # Architecture
//!
//! Worker tasks touch shared state only through the registry, which is
//! guarded by a single mutex that is never held across an `.await`. Each
//! worker marks itself completed from a drop guard, so a worker that
//! fails or is cancelled is still reaped.

pub mod buffer;
pub mod config;
pub mod error;
pub mod ranker;
pub mod reaper;
pub mod registry;
pub mod request;
pub mod response;
pub mod server;
pub mod worker;

// Re-export primary types for convenience.
pub use config::{ConfigError, FfdConfig, LogFormat};
pub use error::{RequestError, ServerError};
pub use registry::{WorkerRegistry, WorkerStatus};
pub use response::{Response, Status};
pub use server::Server;
pub use worker::{WorkerContext, WorkerLimits};
