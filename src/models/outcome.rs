//! Per-run outcome tallies.
//!
//! Every sync run produces one [`SyncOutcome`] per clan; multi-clan runs
//! aggregate them into a [`BatchOutcome`]. Outcomes are ephemeral: they
//! are returned to the caller, never persisted.

use serde::{Deserialize, Serialize};

/// Classification of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Clan could not be resolved or its credential is missing
    Configuration,
    /// Remote ranking service rejected or failed the request
    RemoteApi,
    /// Fetched record failed structural validation
    Malformed,
    /// Write to the persistence port failed
    Persistence,
}

/// A single failed item within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    /// Identity of the failed item (player id, battle id, or clan tag
    /// when the fetch itself failed)
    pub item_id: String,

    /// What went wrong
    pub kind: ErrorKind,
}

/// Tally of one clan's sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Tag of the clan this run covered
    pub clan_tag: String,

    /// Items processed; always `succeeded + failed`
    pub attempted: u32,

    /// Items reconciled successfully (including no-op skips)
    pub succeeded: u32,

    /// Items that failed after any applicable retries
    pub failed: u32,

    /// Items newly inserted (not updates or skips)
    pub new_records: u32,

    /// Failures in processing order
    pub per_item_errors: Vec<ItemError>,

    /// Whether the run was cut short by cooperative cancellation
    pub cancelled: bool,
}

impl SyncOutcome {
    /// Start an empty outcome for a clan.
    pub fn new(clan_tag: impl Into<String>) -> Self {
        Self {
            clan_tag: clan_tag.into(),
            attempted: 0,
            succeeded: 0,
            failed: 0,
            new_records: 0,
            per_item_errors: Vec::new(),
            cancelled: false,
        }
    }

    /// Record one successful item.
    pub fn record_success(&mut self, new_record: bool) {
        self.attempted += 1;
        self.succeeded += 1;
        if new_record {
            self.new_records += 1;
        }
    }

    /// Record one failed item.
    pub fn record_failure(&mut self, item_id: impl Into<String>, kind: ErrorKind) {
        self.attempted += 1;
        self.failed += 1;
        self.per_item_errors.push(ItemError {
            item_id: item_id.into(),
            kind,
        });
    }

    /// An outcome for a clan whose run never got past one failing step.
    pub fn fully_failed(clan_tag: impl Into<String>, kind: ErrorKind) -> Self {
        let tag = clan_tag.into();
        let mut outcome = Self::new(tag.clone());
        outcome.record_failure(tag, kind);
        outcome
    }
}

/// Aggregate of a multi-clan run, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Sum of per-clan `succeeded`
    pub total_succeeded: u32,

    /// Sum of per-clan `failed`
    pub total_failed: u32,

    /// One outcome per clan, preserving registry order
    pub per_clan_outcomes: Vec<SyncOutcome>,
}

impl BatchOutcome {
    /// Aggregate per-clan outcomes, preserving their order.
    pub fn from_outcomes(per_clan_outcomes: Vec<SyncOutcome>) -> Self {
        let total_succeeded = per_clan_outcomes.iter().map(|o| o.succeeded).sum();
        let total_failed = per_clan_outcomes.iter().map(|o| o.failed).sum();
        Self {
            total_succeeded,
            total_failed,
            per_clan_outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outcome_arithmetic() {
        let mut outcome = SyncOutcome::new("PN31");
        outcome.record_success(true);
        outcome.record_success(false);
        outcome.record_failure("b-17", ErrorKind::Malformed);

        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.new_records, 1);
        assert_eq!(outcome.attempted, outcome.succeeded + outcome.failed);
    }

    #[test]
    fn test_error_ordering_follows_processing_order() {
        let mut outcome = SyncOutcome::new("PN31");
        outcome.record_failure("a", ErrorKind::Malformed);
        outcome.record_failure("b", ErrorKind::Persistence);

        assert_eq!(outcome.per_item_errors[0].item_id, "a");
        assert_eq!(outcome.per_item_errors[1].item_id, "b");
    }

    #[test]
    fn test_fully_failed_outcome() {
        let outcome = SyncOutcome::fully_failed("PN30", ErrorKind::RemoteApi);

        assert_eq!(outcome.attempted, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.per_item_errors[0].item_id, "PN30");
        assert_eq!(outcome.per_item_errors[0].kind, ErrorKind::RemoteApi);
    }

    #[test]
    fn test_batch_totals_match_per_clan_sums() {
        let mut a = SyncOutcome::new("PN31");
        a.record_success(true);
        a.record_success(true);
        let mut b = SyncOutcome::new("PN30");
        b.record_success(false);
        b.record_failure("x", ErrorKind::Persistence);

        let batch = BatchOutcome::from_outcomes(vec![a, b]);

        assert_eq!(batch.total_succeeded, 3);
        assert_eq!(batch.total_failed, 1);
        assert_eq!(batch.per_clan_outcomes[0].clan_tag, "PN31");
        assert_eq!(batch.per_clan_outcomes[1].clan_tag, "PN30");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = SyncOutcome::fully_failed("PN31", ErrorKind::Configuration);
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("configuration"));

        let parsed: SyncOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }
}
