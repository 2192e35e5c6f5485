//! Sync orchestration.
//!
//! Drives one-clan and all-clans runs:
//! 1. Resolve the clan in the registry
//! 2. Fetch the remote sequence (players or battles)
//! 3. Reconcile each record in arrival order
//! 4. Accumulate into a per-clan outcome; aggregate across clans
//!
//! Item failures are absorbed into the outcome counters: no single
//! record's failure aborts a batch, and no clan's failure prevents the
//! other clans from being processed.

pub mod retry;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, BattleFilter, RankingApi};
use crate::config::SyncConfig;
use crate::models::{BatchOutcome, ErrorKind, SyncOutcome};
use crate::reconcile::{
    BattleInsertOutcome, PlayerUpsertOutcome, ReconcileError, Reconciler,
};
use crate::registry::{ClanIdentity, ClanRegistry, RegistryError};
use self::retry::{with_retry, RetryConfig};

/// Errors a sync run can raise to its caller.
///
/// Everything else (remote failures, malformed records, persistence
/// failures) is absorbed into the [`SyncOutcome`] counters instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] RegistryError),
}

/// What a run synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    Players,
    Battles,
}

/// Drives sync runs over the registry, API client and reconciler.
pub struct SyncOrchestrator {
    registry: Arc<ClanRegistry>,
    api: Arc<dyn RankingApi>,
    reconciler: Arc<Reconciler>,
    retry: RetryConfig,
    max_concurrency: usize,
    battle_filter: BattleFilter,
    cancelled: Arc<RwLock<bool>>,
}

impl SyncOrchestrator {
    pub fn new(
        registry: Arc<ClanRegistry>,
        api: Arc<dyn RankingApi>,
        reconciler: Arc<Reconciler>,
        settings: &SyncConfig,
    ) -> Self {
        Self {
            registry,
            api,
            reconciler,
            retry: RetryConfig::from_sync_config(settings),
            max_concurrency: settings.max_concurrency.max(1) as usize,
            battle_filter: BattleFilter::default(),
            cancelled: Arc::new(RwLock::new(false)),
        }
    }

    /// Builder method to set the server-side battle filter.
    pub fn with_battle_filter(mut self, filter: BattleFilter) -> Self {
        self.battle_filter = filter;
        self
    }

    /// Request cooperative cancellation of the current run.
    ///
    /// In-flight items finish; no new fetch or reconcile work starts.
    pub async fn cancel(&self) {
        *self.cancelled.write().await = true;
    }

    async fn is_cancelled(&self) -> bool {
        *self.cancelled.read().await
    }

    async fn reset_cancel(&self) {
        *self.cancelled.write().await = false;
    }

    /// Synchronize a single clan.
    ///
    /// An unresolvable tag is the only error raised here, before any
    /// network activity; all later failures land in the outcome.
    pub async fn sync_one_clan(
        &self,
        tag: &str,
        target: SyncTarget,
    ) -> Result<SyncOutcome, SyncError> {
        self.reset_cancel().await;
        let clan = self.registry.resolve_tag(tag)?.clone();
        debug!(clan = %clan.tag, clan_id = clan.clan_id, "resolved clan");
        Ok(self.run_clan(&clan, target).await)
    }

    /// Synchronize every registered clan, preserving registry order in
    /// the aggregate regardless of completion order.
    pub async fn sync_all_clans(self: Arc<Self>, target: SyncTarget) -> BatchOutcome {
        self.reset_cancel().await;

        let clans: Vec<ClanIdentity> = self.registry.list_all().to_vec();
        let clan_count = clans.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut workers = JoinSet::new();

        for (index, clan) in clans.into_iter().enumerate() {
            let orchestrator = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");

                if orchestrator.is_cancelled().await {
                    let mut outcome = SyncOutcome::new(clan.tag.as_str());
                    outcome.cancelled = true;
                    return (index, outcome);
                }

                // Registry entries always resolve; this guards the batch
                // against a clan whose configuration went bad anyway.
                let outcome = match orchestrator.registry.resolve_tag(&clan.tag) {
                    Ok(_) => orchestrator.run_clan(&clan, target).await,
                    Err(e) => {
                        error!(clan = %clan.tag, "skipping unresolvable clan: {}", e);
                        SyncOutcome::fully_failed(clan.tag.clone(), ErrorKind::Configuration)
                    }
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<SyncOutcome>> = vec![None; clan_count];
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!("sync worker panicked: {}", e),
            }
        }

        BatchOutcome::from_outcomes(slots.into_iter().flatten().collect())
    }

    /// One clan's run: fetch, then reconcile in arrival order.
    async fn run_clan(&self, clan: &ClanIdentity, target: SyncTarget) -> SyncOutcome {
        info!(clan = %clan.tag, ?target, "starting sync run");
        let mut outcome = SyncOutcome::new(clan.tag.as_str());

        match target {
            SyncTarget::Players => {
                let fetched = with_retry(&self.retry, ApiError::is_retryable, || {
                    self.api.fetch_players(clan)
                })
                .await;

                match fetched {
                    Err(e) => {
                        error!(clan = %clan.tag, "player fetch failed: {}", e);
                        outcome.record_failure(clan.tag.clone(), ErrorKind::RemoteApi);
                    }
                    Ok(records) => {
                        for raw in &records {
                            if self.is_cancelled().await {
                                outcome.cancelled = true;
                                break;
                            }

                            let item_id = raw
                                .account_id
                                .map(|id| id.to_string())
                                .unwrap_or_else(|| "unknown".to_string());

                            let result =
                                with_retry(&self.retry, ReconcileError::is_retryable, || {
                                    self.reconciler.reconcile_player(raw, clan)
                                })
                                .await;

                            match result {
                                Ok(PlayerUpsertOutcome::Inserted) => outcome.record_success(true),
                                Ok(_) => outcome.record_success(false),
                                Err(e) => {
                                    warn!(clan = %clan.tag, item = %item_id, "player reconcile failed: {}", e);
                                    outcome.record_failure(item_id, reconcile_error_kind(&e));
                                }
                            }
                        }
                    }
                }
            }
            SyncTarget::Battles => {
                let fetched = with_retry(&self.retry, ApiError::is_retryable, || {
                    self.api.fetch_battles(clan, &self.battle_filter)
                })
                .await;

                match fetched {
                    Err(e) => {
                        error!(clan = %clan.tag, "battle fetch failed: {}", e);
                        outcome.record_failure(clan.tag.clone(), ErrorKind::RemoteApi);
                    }
                    Ok(records) => {
                        for raw in &records {
                            if self.is_cancelled().await {
                                outcome.cancelled = true;
                                break;
                            }

                            let item_id = raw
                                .id
                                .map(|id| id.to_string())
                                .unwrap_or_else(|| "unknown".to_string());

                            let result =
                                with_retry(&self.retry, ReconcileError::is_retryable, || {
                                    self.reconciler.reconcile_battle(raw)
                                })
                                .await;

                            match result {
                                Ok(BattleInsertOutcome::Inserted) => outcome.record_success(true),
                                Ok(BattleInsertOutcome::AlreadyRecorded) => {
                                    outcome.record_success(false)
                                }
                                Err(e) => {
                                    warn!(clan = %clan.tag, item = %item_id, "battle reconcile failed: {}", e);
                                    outcome.record_failure(item_id, reconcile_error_kind(&e));
                                }
                            }
                        }
                    }
                }
            }
        }

        info!(
            clan = %outcome.clan_tag,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            new_records = outcome.new_records,
            cancelled = outcome.cancelled,
            "sync run complete"
        );
        outcome
    }
}

fn reconcile_error_kind(error: &ReconcileError) -> ErrorKind {
    match error {
        ReconcileError::Malformed { .. } => ErrorKind::Malformed,
        ReconcileError::Persistence(_) => ErrorKind::Persistence,
    }
}
