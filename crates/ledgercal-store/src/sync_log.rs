use chrono::{DateTime, Utc};
use ledgercal_core::{
    NewSyncLogEntry, PassOutcome, StoreError, StoreResult, SyncLog, SyncLogCounts, SyncLogEntry,
    SyncSummary, SyncTrigger,
};
use rusqlite::{Row, params};

use crate::error::SqlResultExt;
use crate::{SqliteStore, decode_ts, encode_ts};

struct LogRow {
    id: i64,
    calendar_id: String,
    sync_type: String,
    trigger: String,
    started_at: String,
    finished_at: String,
    pushed: u32,
    pulled: u32,
    deleted: u32,
    skipped: u32,
    errors: String,
    outcome: String,
}

impl LogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            calendar_id: row.get(1)?,
            sync_type: row.get(2)?,
            trigger: row.get(3)?,
            started_at: row.get(4)?,
            finished_at: row.get(5)?,
            pushed: row.get(6)?,
            pulled: row.get(7)?,
            deleted: row.get(8)?,
            skipped: row.get(9)?,
            errors: row.get(10)?,
            outcome: row.get(11)?,
        })
    }

    fn into_entry(self) -> StoreResult<SyncLogEntry> {
        let errors: Vec<String> = serde_json::from_str(&self.errors)
            .map_err(|e| StoreError::InvalidData(format!("sync log errors column: {e}")))?;
        let trigger = SyncTrigger::parse(&self.trigger)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown trigger: {}", self.trigger)))?;
        let outcome = PassOutcome::parse(&self.outcome)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown outcome: {}", self.outcome)))?;

        Ok(SyncLogEntry {
            id: self.id,
            calendar_id: self.calendar_id,
            trigger,
            started_at: decode_ts(&self.started_at)?,
            finished_at: decode_ts(&self.finished_at)?,
            summary: SyncSummary {
                pushed: self.pushed,
                pulled: self.pulled,
                deleted: self.deleted,
                skipped: self.skipped,
                errors,
                sync_type: self.sync_type.parse().map_err(StoreError::InvalidData)?,
            },
            outcome,
        })
    }
}

impl SyncLog for SqliteStore {
    fn append_entry(&self, entry: &NewSyncLogEntry) -> StoreResult<SyncLogEntry> {
        let errors = serde_json::to_string(&entry.summary.errors)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let summary = &entry.summary;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_log (calendar_id, sync_type, trigger_kind, started_at, finished_at, \
             pushed, pulled, deleted, skipped, errors, outcome) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.calendar_id,
                summary.sync_type.as_str(),
                entry.trigger.as_str(),
                encode_ts(entry.started_at),
                encode_ts(entry.finished_at),
                summary.pushed,
                summary.pulled,
                summary.deleted,
                summary.skipped,
                errors,
                entry.outcome.as_str(),
            ],
        )
        .store_err()?;

        Ok(SyncLogEntry {
            id: conn.last_insert_rowid(),
            calendar_id: entry.calendar_id.clone(),
            trigger: entry.trigger,
            started_at: entry.started_at,
            finished_at: entry.finished_at,
            summary: entry.summary.clone(),
            outcome: entry.outcome,
        })
    }

    fn recent_entries(&self, limit: usize) -> StoreResult<Vec<SyncLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, calendar_id, sync_type, trigger_kind, started_at, finished_at, \
                 pushed, pulled, deleted, skipped, errors, outcome \
                 FROM sync_log ORDER BY id DESC LIMIT ?1",
            )
            .store_err()?;
        let rows = stmt
            .query_map([limit], LogRow::from_row)
            .store_err()?
            .collect::<Result<Vec<_>, _>>()
            .store_err()?;
        rows.into_iter().map(LogRow::into_entry).collect()
    }

    fn counts_since(&self, since: DateTime<Utc>) -> StoreResult<SyncLogCounts> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT outcome, pushed, pulled, deleted FROM sync_log WHERE finished_at >= ?1",
            )
            .store_err()?;
        let rows = stmt
            .query_map([encode_ts(since)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })
            .store_err()?
            .collect::<Result<Vec<_>, _>>()
            .store_err()?;

        let mut counts = SyncLogCounts::default();
        for (outcome, pushed, pulled, deleted) in rows {
            let outcome = PassOutcome::parse(&outcome)
                .ok_or_else(|| StoreError::InvalidData(format!("unknown outcome: {outcome}")))?;
            let summary = SyncSummary {
                pushed,
                pulled,
                deleted,
                ..SyncSummary::default()
            };
            counts.add(outcome, &summary);
        }
        Ok(counts)
    }
}
