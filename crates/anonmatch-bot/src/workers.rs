// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic background tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use anonmatch_core::UserId;
use anonmatch_matching::KeyedLocks;

use crate::context::BotContext;
use crate::{keyboards, texts};

/// Evidence sweep and lock GC period.
pub const MAINTENANCE_PERIOD: Duration = Duration::from_secs(300);

/// One queue-worker pass: relaxes idle filters and tells the affected users.
pub async fn queue_tick(ctx: &BotContext) -> usize {
    match ctx.engine.tick(Utc::now()).await {
        Ok(relaxed) => {
            for user in &relaxed {
                ctx.say_with(*user, texts::RELAXED, keyboards::cancel_search())
                    .await;
            }
            relaxed.len()
        }
        Err(e) => {
            warn!(error = %e, "queue tick failed");
            0
        }
    }
}

/// Runs [`queue_tick`] every `period` until `cancel` fires.
pub fn spawn_queue_worker(
    ctx: BotContext,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "queue worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let relaxed = queue_tick(&ctx).await;
                    if relaxed > 0 {
                        debug!(relaxed, "queue tick");
                    }
                }
            }
        }
        info!("queue worker stopped");
    })
}

/// Drops expired evidence and idle user locks every `period`.
pub fn spawn_maintenance(
    ctx: BotContext,
    locks: Arc<KeyedLocks<UserId>>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let swept = ctx.engine.sweep_evidence(Utc::now());
                    let freed = locks.gc();
                    debug!(swept, freed, "maintenance pass");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use anonmatch_core::types::{Department, Gender};
    use anonmatch_core::SearchFilter;
    use anonmatch_test_utils::TestHarness;

    fn context(h: &TestHarness) -> BotContext {
        BotContext::new(
            h.engine.clone(),
            h.community.clone(),
            Arc::new(h.config.clone()),
            h.shutdown.clone(),
        )
    }

    #[tokio::test]
    async fn tick_notifies_relaxed_seekers() {
        let h = TestHarness::builder()
            .with_config(|c| c.matching.idle_threshold_secs = 0)
            .build()
            .await
            .unwrap();
        h.add_verified_user(5, Gender::Female, Department::Akuntansi, 2021)
            .await
            .unwrap();
        let filter = SearchFilter {
            department: Some(Department::TeknikMesin),
            ..SearchFilter::any()
        };
        h.engine
            .matcher
            .search(5, filter, None, &CancellationToken::new())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ctx = context(&h);
        assert_eq!(queue_tick(&ctx).await, 1);
        let bodies = h.channel.bodies_to(5);
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("Belum menemukan partner"));
        assert!(h.engine.matcher.queue_entry(5).await.unwrap().filter.is_any());

        // Already relaxed: nothing more to say.
        assert_eq!(queue_tick(&ctx).await, 0);
        assert_eq!(h.channel.bodies_to(5).len(), 1);
    }

    #[tokio::test]
    async fn workers_stop_on_cancel() {
        let h = TestHarness::new().await.unwrap();
        let cancel = CancellationToken::new();
        let queue = spawn_queue_worker(context(&h), Duration::from_millis(10), cancel.clone());
        let maintenance = spawn_maintenance(
            context(&h),
            Arc::new(KeyedLocks::new()),
            Duration::from_millis(10),
            cancel.clone(),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), queue)
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), maintenance)
            .await
            .unwrap()
            .unwrap();
    }
}
