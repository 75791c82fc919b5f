//! Pass summaries and the sync history kept for observability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::SyncType;

/// Counts and errors of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub pushed: u32,
    pub pulled: u32,
    pub deleted: u32,
    pub skipped: u32,
    #[serde(default)]
    pub errors: Vec<String>,
    pub sync_type: SyncType,
}

impl SyncSummary {
    pub fn new(sync_type: SyncType) -> Self {
        Self {
            sync_type,
            ..Self::default()
        }
    }

    /// A summary carrying a single pass-level error.
    pub fn failed(sync_type: SyncType, error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::new(sync_type)
        }
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True if the pass changed anything locally or remotely.
    pub fn made_changes(&self) -> bool {
        self.pushed > 0 || self.pulled > 0 || self.deleted > 0
    }

    pub fn outcome(&self) -> PassOutcome {
        match (self.has_errors(), self.made_changes() || self.skipped > 0) {
            (false, _) => PassOutcome::Success,
            (true, true) => PassOutcome::Partial,
            (true, false) => PassOutcome::Failed,
        }
    }
}

/// What started a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    #[default]
    Manual,
    Scheduled,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "scheduled" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

/// Overall result of a pass as recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// No errors.
    Success,
    /// Some candidates failed, others went through.
    Partial,
    /// Nothing went through, or the pass aborted.
    Failed,
}

impl PassOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A pass about to be written to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSyncLogEntry {
    pub calendar_id: String,
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: SyncSummary,
    pub outcome: PassOutcome,
}

impl NewSyncLogEntry {
    /// Builds an entry whose outcome is derived from the summary.
    pub fn from_summary(
        calendar_id: impl Into<String>,
        trigger: SyncTrigger,
        started_at: DateTime<Utc>,
        summary: SyncSummary,
    ) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            trigger,
            started_at,
            finished_at: Utc::now(),
            outcome: summary.outcome(),
            summary,
        }
    }

    /// Overrides the derived outcome, e.g. for an aborted pass.
    #[must_use]
    pub fn with_outcome(mut self, outcome: PassOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// A recorded pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub calendar_id: String,
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: SyncSummary,
    pub outcome: PassOutcome,
}

/// Aggregated counts over a period of the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogCounts {
    pub passes: u32,
    pub succeeded: u32,
    pub partial: u32,
    pub failed: u32,
    pub pushed: u32,
    pub pulled: u32,
    pub deleted: u32,
}

impl SyncLogCounts {
    /// Folds one entry into the counts.
    pub fn add(&mut self, outcome: PassOutcome, summary: &SyncSummary) {
        self.passes += 1;
        match outcome {
            PassOutcome::Success => self.succeeded += 1,
            PassOutcome::Partial => self.partial += 1,
            PassOutcome::Failed => self.failed += 1,
        }
        self.pushed += summary.pushed;
        self.pulled += summary.pulled;
        self.deleted += summary.deleted;
    }
}

/// Answer to a status query: recent passes plus rolling 24h counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusReport {
    pub recent: Vec<SyncLogEntry>,
    pub last_24h: SyncLogCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_summary() {
        let mut summary = SyncSummary::new(SyncType::All);
        assert_eq!(summary.outcome(), PassOutcome::Success);

        summary.push_error("create failed for Foo");
        assert_eq!(summary.outcome(), PassOutcome::Failed);

        summary.pushed = 2;
        assert_eq!(summary.outcome(), PassOutcome::Partial);
    }

    #[test]
    fn counts_fold() {
        let mut counts = SyncLogCounts::default();
        let summary = SyncSummary {
            pushed: 3,
            pulled: 1,
            deleted: 2,
            ..SyncSummary::new(SyncType::All)
        };
        counts.add(PassOutcome::Success, &summary);
        counts.add(PassOutcome::Failed, &SyncSummary::failed(SyncType::All, "boom"));

        assert_eq!(counts.passes, 2);
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pushed, 3);
        assert_eq!(counts.pulled, 1);
        assert_eq!(counts.deleted, 2);
    }

    #[test]
    fn trigger_and_outcome_parse() {
        for trigger in [SyncTrigger::Manual, SyncTrigger::Scheduled] {
            assert_eq!(SyncTrigger::parse(trigger.as_str()), Some(trigger));
        }
        for outcome in [PassOutcome::Success, PassOutcome::Partial, PassOutcome::Failed] {
            assert_eq!(PassOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(PassOutcome::parse("meh"), None);
    }
}
