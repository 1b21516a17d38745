//! Listener lifecycle: bind, accept, dispatch, and graceful shutdown.
//!
//! A [`Server`] owns the listening socket, the [`WorkerRegistry`], and the
//! background [`Reaper`]. [`Server::run`] accepts connections and hands
//! each one to a registered worker task until [`Server::stop`] is called.
//! Stopping closes the listener, stops the reaper, and then joins every
//! worker still in the registry, so in-flight requests finish before
//! `stop` returns.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ffd_store::RecordStore;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::FfdConfig;
use crate::error::ServerError;
use crate::reaper::{Reaper, join_worker};
use crate::registry::WorkerRegistry;
use crate::response::Status;
use crate::worker::{WorkerContext, WorkerLimits, handle_connection};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// A bound proximity-query server.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    /// Present until claimed by [`Server::run`] or closed by [`Server::stop`].
    listener: Mutex<Option<TcpListener>>,
    registry: Arc<WorkerRegistry>,
    context: Arc<WorkerContext>,
    reaper: Mutex<Option<Reaper>>,
    shutdown: watch::Sender<bool>,
    accept_closed: watch::Sender<bool>,
    stopped: watch::Sender<bool>,
    stopping: AtomicBool,
}

impl Server {
    /// Bind the configured address and start the reaper.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &FfdConfig, store: Arc<dyn RecordStore>) -> Result<Arc<Self>, ServerError> {
        let addr = config
            .server
            .socket_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        let listener = listen(addr, config.server.backlog)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(format!("local address of {addr}: {e}")))?;

        let registry = Arc::new(WorkerRegistry::new());
        let reaper = Reaper::spawn(Arc::clone(&registry), config.server.reap_interval());

        info!(
            addr = %local_addr,
            backlog = config.server.backlog,
            "listening for proximity queries"
        );

        Ok(Arc::new(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            registry,
            context: Arc::new(WorkerContext::new(store, WorkerLimits::from_config(config))),
            reaper: Mutex::new(Some(reaper)),
            shutdown: watch::Sender::new(false),
            accept_closed: watch::Sender::new(false),
            stopped: watch::Sender::new(false),
            stopping: AtomicBool::new(false),
        }))
    }

    /// The address actually bound (useful when the configured port is `0`).
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of workers currently registered, running or awaiting reaping.
    pub fn live_workers(&self) -> usize {
        self.registry.len()
    }

    /// Whether [`Server::stop`] has finished.
    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Accept connections until [`Server::stop`] is called.
    ///
    /// Returns once the listener has been closed. A call that starts after
    /// [`Server::stop`] has closed the listener returns `Ok(())` at once.
    /// Only one call can own the listener: a second call while another is
    /// accepting returns [`ServerError::NotListening`].
    pub async fn run(&self) -> Result<(), ServerError> {
        let claimed = lock(&self.listener).take();
        let Some(listener) = claimed else {
            // `stop` raises `stopping` before it takes the listener.
            if self.stopping.load(Ordering::Acquire) {
                debug!("listener closed before the accept loop started");
                return Ok(());
            }
            return Err(ServerError::NotListening);
        };
        let _closed = AcceptClosed(&self.accept_closed);
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.dispatch(stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        info!(addr = %self.local_addr, "listener closed");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let context = Arc::clone(&self.context);
        let id = self.registry.spawn(move |id| async move {
            let status = handle_connection(stream, &context).await;
            debug!(
                worker_id = %id,
                %peer,
                status = ?status.map(Status::code),
                "connection finished"
            );
        });
        debug!(worker_id = %id, %peer, "connection accepted");
    }

    /// Stop accepting, stop the reaper, and wait for every worker to finish.
    ///
    /// Safe to call more than once and from several tasks at once; every
    /// call returns after the first has finished draining. The future must
    /// be driven to completion.
    pub async fn stop(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            let mut stopped = self.stopped.subscribe();
            stopped.wait_for(|done| *done).await.ok();
            return;
        }

        info!("stopping server");
        self.shutdown.send_replace(true);

        // Never claimed by `run`: close it here.
        let unclaimed = lock(&self.listener).take();
        if unclaimed.is_some() {
            drop(unclaimed);
            self.accept_closed.send_replace(true);
        }
        let mut accept_closed = self.accept_closed.subscribe();
        accept_closed.wait_for(|closed| *closed).await.ok();

        let reaper = lock(&self.reaper).take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
        }

        let drained = self.drain().await;
        info!(drained, "server stopped");
        self.stopped.send_replace(true);
    }

    /// Join and remove every registered worker.
    async fn drain(&self) -> usize {
        let outstanding = self.registry.take_outstanding();
        if !outstanding.is_empty() {
            debug!(workers = outstanding.len(), "waiting for in-flight workers");
        }

        let mut joined = Vec::with_capacity(outstanding.len());
        for worker in outstanding {
            joined.push(join_worker(worker).await);
        }
        self.registry.remove_all(&joined)
    }
}

fn listen(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ServerError> {
    let socket = if addr.is_ipv6() {
        TcpSocket::new_v6()
    } else {
        TcpSocket::new_v4()
    }
    .map_err(|e| ServerError::Bind(format!("socket for {addr}: {e}")))?;

    socket
        .set_reuseaddr(true)
        .map_err(|e| ServerError::Bind(format!("SO_REUSEADDR on {addr}: {e}")))?;
    socket
        .bind(addr)
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    socket
        .listen(backlog)
        .map_err(|e| ServerError::Bind(format!("listen failed on {addr}: {e}")))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the accept loop as closed when `run` returns or is dropped.
struct AcceptClosed<'a>(&'a watch::Sender<bool>);

impl Drop for AcceptClosed<'_> {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}
