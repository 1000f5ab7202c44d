//! Batch lifecycle sweeps.
//!
//! Two recurring sweeps keep the local account population tidy: one
//! disables accounts inactive beyond a threshold, one permanently deletes
//! accounts that have sat disabled for over a year. Each sweep runs in
//! bounded batches; a failing batch is counted and the sweep carries on,
//! until three failures halt it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rand::Rng;
use tokio::task::JoinHandle;

use crate::services::ServiceError;
use crate::store::IdentityStore;

/// Rows per batch.
pub const BATCH_SIZE: i64 = 10;
/// Sweep halts once this many batches have failed.
const MAX_ERRORS: usize = 3;
/// Disabled accounts are purged after a year without a login.
const DELETE_AFTER_DAYS: i64 = 365;

/// Result of one sweep invocation. Transient; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub total: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy)]
enum SweepKind {
    Disable,
    Delete,
}

impl SweepKind {
    fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Disable => "disable-inactive",
            SweepKind::Delete => "delete-disabled",
        }
    }
}

pub struct LifecycleSweeper {
    store: Arc<dyn IdentityStore>,
    inactivity_threshold: Duration,
}

impl LifecycleSweeper {
    pub fn new(store: Arc<dyn IdentityStore>, inactivity_threshold_days: i64) -> Self {
        Self {
            store,
            inactivity_threshold: Duration::days(inactivity_threshold_days),
        }
    }

    /// Disable enabled local accounts inactive beyond the threshold.
    pub async fn disable_inactive(&self) -> SweepOutcome {
        self.run(SweepKind::Disable).await
    }

    /// Permanently delete local accounts disabled and inactive for over a
    /// year, dependents first.
    pub async fn delete_disabled(&self) -> SweepOutcome {
        self.run(SweepKind::Delete).await
    }

    async fn run(&self, kind: SweepKind) -> SweepOutcome {
        let mut total = 0usize;
        let mut errors = 0usize;

        loop {
            let result = match kind {
                SweepKind::Disable => self.disable_batch().await,
                SweepKind::Delete => self.delete_batch().await,
            };

            let (last_batch, failed) = match result {
                Ok(n) => {
                    total += n;
                    (n, false)
                }
                Err(e) => {
                    tracing::warn!(
                        sweep = kind.as_str(),
                        error = %e,
                        "Sweep batch failed; continuing"
                    );
                    errors += 1;
                    (0, true)
                }
            };

            let more_expected = last_batch >= BATCH_SIZE as usize || failed;
            if !more_expected || errors >= MAX_ERRORS {
                break;
            }
        }

        if total > 0 || errors > 0 {
            tracing::info!(
                sweep = kind.as_str(),
                total = total,
                errors = errors,
                "Lifecycle sweep complete"
            );
        }

        SweepOutcome { total, errors }
    }

    async fn disable_batch(&self) -> Result<usize, ServiceError> {
        let cutoff = Utc::now() - self.inactivity_threshold;
        let accounts = self
            .store
            .find_enabled_local_inactive_before(cutoff, BATCH_SIZE)
            .await?;

        let count = accounts.len();
        for mut account in accounts {
            account.enabled = false;
            self.store.update_account(&account).await?;
            tracing::debug!(account_id = %account.account_id, "Account disabled for inactivity");
        }
        Ok(count)
    }

    async fn delete_batch(&self) -> Result<usize, ServiceError> {
        let cutoff = Utc::now() - Duration::days(DELETE_AFTER_DAYS);
        let accounts = self
            .store
            .find_disabled_local_inactive_before(cutoff, BATCH_SIZE)
            .await?;

        let count = accounts.len();
        for account in accounts {
            // Dependent rows first to satisfy referential constraints.
            self.store.delete_retry_count(&account.username).await?;
            self.store
                .delete_tokens_for_account(account.account_id)
                .await?;
            self.store.delete_account(account.account_id).await?;
            tracing::debug!(account_id = %account.account_id, "Dormant account purged");
        }
        Ok(count)
    }
}

/// Spawn the recurring sweeps.
///
/// A randomized initial delay spreads restarts across service instances.
/// The two sweeps run back-to-back on one task, so no sweep ever overlaps
/// itself.
pub fn spawn_lifecycle_sweeps(
    sweeper: Arc<LifecycleSweeper>,
    interval: StdDuration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let initial_delay = {
            let mut rng = rand::thread_rng();
            StdDuration::from_secs(rng.gen_range(0..interval.as_secs().max(1)))
        };
        tracing::info!(
            initial_delay_secs = initial_delay.as_secs(),
            interval_secs = interval.as_secs(),
            "Lifecycle sweeps scheduled"
        );
        tokio::time::sleep(initial_delay).await;

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            sweeper.disable_inactive().await;
            sweeper.delete_disabled().await;
        }
    })
}
