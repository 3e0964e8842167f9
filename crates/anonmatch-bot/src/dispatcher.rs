// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker pool for inbound updates.
//!
//! Events are sharded by user id onto per-worker FIFO queues, so one user's
//! events are handled strictly in arrival order while different users run
//! in parallel. Each event additionally holds its user's lock for the
//! duration of the handler, and the handler itself runs in its own task
//! under a timeout so a panic or a hang never takes a worker down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use anonmatch_config::model::BotConfig;
use anonmatch_core::{AnonmatchError, ChannelAdapter, InboundEvent, UserId};
use anonmatch_matching::KeyedLocks;

use crate::router::Router;

/// Pause after a transient receive error.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

struct Shared {
    router: Arc<Router>,
    locks: Arc<KeyedLocks<UserId>>,
    depth: AtomicUsize,
    handler_timeout: Duration,
}

pub struct Dispatcher {
    shared: Arc<Shared>,
    workers: usize,
    queue_per_worker: usize,
    drain_timeout: Duration,
}

impl Dispatcher {
    pub fn new(router: Router, config: &BotConfig) -> Self {
        let workers = config.max_update_workers.max(1);
        Self {
            shared: Arc::new(Shared {
                router: Arc::new(router),
                locks: Arc::new(KeyedLocks::new()),
                depth: AtomicUsize::new(0),
                handler_timeout: Duration::from_secs(config.handler_timeout_secs),
            }),
            workers,
            queue_per_worker: (config.max_update_queue / workers).max(1),
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.shared.router
    }

    /// The per-user locks, for periodic garbage collection.
    pub fn locks(&self) -> Arc<KeyedLocks<UserId>> {
        self.shared.locks.clone()
    }

    /// Receives from `channel` until `cancel` fires or the channel closes,
    /// then drains queued events within the drain deadline.
    pub async fn run(
        &self,
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        cancel: CancellationToken,
    ) -> Result<(), AnonmatchError> {
        let (senders, handles) = self.spawn_workers();
        info!(
            workers = self.workers,
            queue_per_worker = self.queue_per_worker,
            "dispatcher running"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, no longer accepting updates");
                    break;
                }
                received = channel.receive() => match received {
                    Ok(event) => self.enqueue(&senders, event),
                    Err(AnonmatchError::ChannelClosed) => {
                        info!("inbound channel closed, no longer accepting updates");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "channel receive error");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                        }
                    }
                },
            }
        }

        drop(senders);
        self.drain(handles).await;
        Ok(())
    }

    fn spawn_workers(&self) -> (Vec<mpsc::Sender<InboundEvent>>, Vec<JoinHandle<()>>) {
        (0..self.workers)
            .map(|index| {
                let (tx, rx) = mpsc::channel(self.queue_per_worker);
                let shared = self.shared.clone();
                (tx, tokio::spawn(worker(index, rx, shared)))
            })
            .unzip()
    }

    fn shard(&self, user: UserId) -> usize {
        // rem_euclid keeps negative ids (group chats) in range.
        user.rem_euclid(self.workers as i64) as usize
    }

    fn enqueue(&self, senders: &[mpsc::Sender<InboundEvent>], event: InboundEvent) {
        let user = event.user_id;
        let shard = self.shard(user);
        // Count before sending so the worker's decrement never underflows.
        let depth = self.shared.depth.fetch_add(1, Ordering::SeqCst) + 1;
        match senders[shard].try_send(event) {
            Ok(()) => anonmatch_prometheus::set_update_queue_depth(depth),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.shared.depth.fetch_sub(1, Ordering::SeqCst);
                warn!(user_id = user, shard, "update queue full, dropping event");
                anonmatch_prometheus::record_error("update_queue_full");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.shared.depth.fetch_sub(1, Ordering::SeqCst);
                warn!(user_id = user, shard, "worker stopped, dropping event");
            }
        }
    }

    async fn drain(&self, handles: Vec<JoinHandle<()>>) {
        let pending = self.shared.depth.load(Ordering::SeqCst);
        info!(pending, "draining update workers");
        match tokio::time::timeout(self.drain_timeout, futures::future::join_all(handles)).await {
            Ok(_) => info!("update workers drained"),
            Err(_) => warn!(
                timeout_secs = self.drain_timeout.as_secs(),
                remaining = self.shared.depth.load(Ordering::SeqCst),
                "drain deadline reached, abandoning queued updates"
            ),
        }
    }
}

async fn worker(index: usize, mut rx: mpsc::Receiver<InboundEvent>, shared: Arc<Shared>) {
    debug!(worker = index, "update worker started");
    while let Some(event) = rx.recv().await {
        let depth = shared.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        anonmatch_prometheus::set_update_queue_depth(depth);
        shared.process(event).await;
    }
    debug!(worker = index, "update worker stopped");
}

impl Shared {
    async fn process(&self, event: InboundEvent) {
        let user = event.user_id;
        let started = Instant::now();
        let guard = self.locks.lock(user).await;
        anonmatch_prometheus::record_lock_wait(started.elapsed());

        let router = self.router.clone();
        let mut handle = tokio::spawn(async move { router.handle(event).await });
        match tokio::time::timeout(self.handler_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(user_id = user, error = %e, "update handler panicked");
                anonmatch_prometheus::record_error("handler_panic");
            }
            Err(_) => {
                handle.abort();
                warn!(
                    user_id = user,
                    timeout_secs = self.handler_timeout.as_secs(),
                    "update handler timed out"
                );
                anonmatch_prometheus::record_error("handler_timeout");
            }
        }

        drop(guard);
        self.locks.release(&user);
        anonmatch_prometheus::record_update_duration(started.elapsed());
    }
}
