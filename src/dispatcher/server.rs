use super::connection::{ConnectionOutcome, handle_connection};
use crate::config::ProcessingConfig;
use crate::executor::{TaskHandlerRegistry, WorkerPool};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// How long in-flight connections get to finish once the server stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause after a failed `accept` so a persistent error does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Cloneable trigger that stops a running [`ProcessingServer`].
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The back-tier TCP service.
///
/// Every accepted connection is served by its own task in a `JoinSet`, so the
/// accept loop never waits on task execution and a connection task that dies
/// is reaped without touching the others.
pub struct ProcessingServer {
    listener: TcpListener,
    pool: Arc<WorkerPool>,
    shutdown: ShutdownHandle,
}

impl ProcessingServer {
    pub async fn bind(config: &ProcessingConfig, registry: Arc<TaskHandlerRegistry>) -> Result<Self> {
        let pool = WorkerPool::new(registry, config.workers);
        Self::bind_with_pool(config.bind_addr, pool).await
    }

    pub async fn bind_with_pool(addr: SocketAddr, pool: Arc<WorkerPool>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            "Processing server listening on {} ({} worker slots)",
            listener.local_addr()?,
            pool.size()
        );

        Ok(Self {
            listener,
            pool,
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn pool(&self) -> Arc<WorkerPool> {
        self.pool.clone()
    }

    /// Accepts connections until shutdown is triggered, then drains.
    pub async fn run(self) -> Result<()> {
        let ProcessingServer {
            listener,
            pool,
            shutdown,
        } = self;

        let mut stop_rx = shutdown.subscribe();
        let mut connections: JoinSet<ConnectionOutcome> = JoinSet::new();

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }

                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    reap(result);
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let pool = pool.clone();
                            let shutdown = shutdown.clone();
                            connections.spawn(async move {
                                handle_connection(stream, peer, &pool, &shutdown).await
                            });
                        }
                        Err(e) => {
                            tracing::warn!("Accept failed: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        // Stop accepting before draining
        drop(listener);
        tracing::info!("Processing server stopping, {} connection(s) in flight", connections.len());

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some(result) = connections.join_next().await {
                reap(result);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!("Aborting {} connection(s) after {:?}", connections.len(), DRAIN_TIMEOUT);
            connections.shutdown().await;
        }

        pool.shutdown().await;
        tracing::info!("Processing server stopped");
        Ok(())
    }
}

fn reap(result: Result<ConnectionOutcome, tokio::task::JoinError>) {
    match result {
        Ok(outcome) => tracing::debug!("Connection task finished: {:?}", outcome),
        Err(e) => tracing::error!("Connection task died: {}", e),
    }
}
