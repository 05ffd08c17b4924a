//! Relay sink accept loop.
//!
//! Each accepted connection gets its own task that runs exactly one
//! read → decode → stamp → persist cycle and then drops the connection.
//! The acceptor only waits for a free worker slot, never for storage. A slot
//! stays taken until the store returns, even when the cycle gave up on it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use postbox_db::MessageStore;
use postbox_types::{StoredMessage, read_frame};

use crate::clock::ReceiptClock;
use crate::config::SinkConfig;
use crate::error::RelayError;

/// Pause after a failed `accept` so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Shared state for all relay workers.
#[derive(Clone)]
pub struct RelaySink {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    store: Arc<dyn MessageStore>,
    clock: ReceiptClock,
    workers: Arc<Semaphore>,
    max_workers: u32,
    max_frame_size: usize,
    read_timeout: Duration,
    persist_timeout: Duration,
}

impl RelaySink {
    pub fn new(store: Arc<dyn MessageStore>, config: &SinkConfig) -> Self {
        let max_workers = u32::try_from(config.max_workers.max(1)).unwrap_or(u32::MAX);
        Self {
            inner: Arc::new(RelayInner {
                store,
                clock: ReceiptClock::new(),
                workers: Arc::new(Semaphore::new(max_workers as usize)),
                max_workers,
                max_frame_size: config.max_frame_size,
                read_timeout: config.read_timeout,
                persist_timeout: config.persist_timeout,
            }),
        }
    }

    pub fn clock(&self) -> &ReceiptClock {
        &self.inner.clock
    }

    /// Run the accept loop. Runs until the task is cancelled.
    pub async fn run(self, listener: TcpListener) {
        self.run_until_shutdown(listener, std::future::pending()).await
    }

    /// Run the accept loop until `shutdown` resolves, then wait for workers
    /// already spawned to finish their cycle.
    ///
    /// The wait is bounded by one read plus one persist timeout; an insert
    /// still blocked after that is abandoned.
    pub async fn run_until_shutdown<F>(self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Relay sink accepting on {:?} (store: {})",
            listener.local_addr().ok(),
            self.inner.store.backend()
        );

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.inner.workers.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((mut stream, peer)) => {
                    debug!("Relay: connection from {}", peer);
                    let sink = self.clone();
                    tokio::spawn(async move {
                        match sink.cycle(&mut stream, Some(permit)).await {
                            Ok(Some(stored)) => {
                                info!(
                                    "Message saved from {}: {} at {}",
                                    peer,
                                    stored.username,
                                    stored.date_string()
                                );
                            }
                            Ok(None) => {
                                debug!("Relay: {} closed without sending data", peer);
                            }
                            Err(e @ RelayError::Timeout { stage: "persist", .. }) => {
                                warn!("Relay: message from {} not confirmed: {}", peer, e);
                            }
                            Err(e) => {
                                warn!("Relay: message from {} dropped: {}", peer, e);
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Relay accept error: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        info!("Relay sink stopped accepting");
        self.drain().await;
    }

    /// Wait until every worker slot is free again.
    async fn drain(&self) {
        let busy = self.inner.max_workers as usize - self.inner.workers.available_permits();
        if busy == 0 {
            return;
        }
        debug!("Relay: waiting for {} in-flight workers", busy);

        let grace = self.inner.read_timeout + self.inner.persist_timeout;
        match tokio::time::timeout(grace, self.inner.workers.acquire_many(self.inner.max_workers)).await {
            Ok(_) => info!("Relay sink drained"),
            Err(_) => warn!(
                "Relay: workers still busy after {} ms, abandoning them",
                grace.as_millis()
            ),
        }
    }

    /// Run one relay cycle on an accepted stream.
    ///
    /// Returns `Ok(None)` for a connection that closed without sending data;
    /// nothing is persisted in that case.
    pub async fn process<S>(&self, stream: &mut S) -> Result<Option<StoredMessage>, RelayError>
    where
        S: AsyncRead + Unpin,
    {
        self.cycle(stream, None).await
    }

    /// One cycle holding a worker slot. The slot moves into the blocking insert
    /// and is released only when the store returns.
    async fn cycle<S>(
        &self,
        stream: &mut S,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<Option<StoredMessage>, RelayError>
    where
        S: AsyncRead + Unpin,
    {
        let read = tokio::time::timeout(
            self.inner.read_timeout,
            read_frame(stream, self.inner.max_frame_size),
        )
        .await
        .map_err(|_| RelayError::Timeout {
            stage: "read",
            after_ms: self.inner.read_timeout.as_millis(),
        })?;

        let Some(message) = read? else {
            return Ok(None);
        };

        let stored = message.stamp(self.inner.clock.stamp());

        // Storage is synchronous; keep it off the runtime threads
        let store = self.inner.store.clone();
        let doc = stored.clone();
        let write = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            store.insert(&doc)
        });

        tokio::time::timeout(self.inner.persist_timeout, write)
            .await
            .map_err(|_| RelayError::Timeout {
                stage: "persist",
                after_ms: self.inner.persist_timeout.as_millis(),
            })?
            .map_err(|e| RelayError::Persist(anyhow::anyhow!("persist task failed: {}", e)))?
            .map_err(RelayError::Persist)?;

        Ok(Some(stored))
    }
}
