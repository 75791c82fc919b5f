use chrono::Utc;
use ledgercal_core::{LogicalId, StoreResult, SyncTombstone, TombstoneTracker};
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use crate::error::SqlResultExt;
use crate::{SqliteStore, decode_ts, encode_ts};

const TOMBSTONE_COLUMNS: &str = "logical_id, external_id, is_deleted, synced_at";

fn read_tombstone(row: &Row<'_>) -> rusqlite::Result<(String, Option<String>, bool, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_tombstone(
    (logical_id, external_id, is_deleted, synced_at): (String, Option<String>, bool, String),
) -> StoreResult<SyncTombstone> {
    Ok(SyncTombstone {
        logical_id: LogicalId::new(logical_id),
        external_id,
        is_deleted,
        synced_at: decode_ts(&synced_at)?,
    })
}

impl SqliteStore {
    fn tombstone_where(&self, clause: &str, key: &str) -> StoreResult<Option<SyncTombstone>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {TOMBSTONE_COLUMNS} FROM sync_tombstones WHERE {clause} LIMIT 1"),
            [key],
            read_tombstone,
        )
        .optional()
        .store_err()?
        .map(into_tombstone)
        .transpose()
    }
}

impl TombstoneTracker for SqliteStore {
    fn record_synced(&self, logical_id: &LogicalId, external_id: &str) -> StoreResult<()> {
        // the conflict arm leaves is_deleted alone
        self.conn()?
            .execute(
                "INSERT INTO sync_tombstones (logical_id, external_id, is_deleted, synced_at) \
                 VALUES (?1, ?2, 0, ?3) \
                 ON CONFLICT (logical_id) DO UPDATE SET \
                 external_id = excluded.external_id, synced_at = excluded.synced_at",
                params![logical_id.as_str(), external_id, encode_ts(Utc::now())],
            )
            .store_err()?;
        debug!(%logical_id, external_id, "Recorded synced tombstone");
        Ok(())
    }

    fn record_deleted(&self, logical_id: &LogicalId) -> StoreResult<()> {
        self.conn()?
            .execute(
                "INSERT INTO sync_tombstones (logical_id, external_id, is_deleted, synced_at) \
                 VALUES (?1, NULL, 1, ?2) \
                 ON CONFLICT (logical_id) DO UPDATE SET \
                 is_deleted = 1, synced_at = excluded.synced_at",
                params![logical_id.as_str(), encode_ts(Utc::now())],
            )
            .store_err()?;
        debug!(%logical_id, "Recorded deleted tombstone");
        Ok(())
    }

    fn is_deleted(&self, logical_id: &LogicalId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let deleted = conn
            .query_row(
                "SELECT is_deleted FROM sync_tombstones WHERE logical_id = ?1",
                [logical_id.as_str()],
                |row| row.get::<_, bool>(0),
            )
            .optional()
            .store_err()?;
        Ok(deleted.unwrap_or(false))
    }

    fn external_id_for(&self, logical_id: &LogicalId) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        let external_id = conn
            .query_row(
                "SELECT external_id FROM sync_tombstones WHERE logical_id = ?1",
                [logical_id.as_str()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .store_err()?;
        Ok(external_id.flatten())
    }

    fn get_tombstone(&self, logical_id: &LogicalId) -> StoreResult<Option<SyncTombstone>> {
        self.tombstone_where("logical_id = ?1", logical_id.as_str())
    }

    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<SyncTombstone>> {
        self.tombstone_where("external_id = ?1", external_id)
    }

    fn list_tombstones(&self) -> StoreResult<Vec<SyncTombstone>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TOMBSTONE_COLUMNS} FROM sync_tombstones ORDER BY logical_id"
            ))
            .store_err()?;
        let rows = stmt
            .query_map([], read_tombstone)
            .store_err()?
            .collect::<Result<Vec<_>, _>>()
            .store_err()?;
        rows.into_iter().map(into_tombstone).collect()
    }

    fn restore(&self, logical_id: &LogicalId) -> StoreResult<bool> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE sync_tombstones SET is_deleted = 0, external_id = NULL, synced_at = ?2 \
                 WHERE logical_id = ?1 AND is_deleted = 1",
                params![logical_id.as_str(), encode_ts(Utc::now())],
            )
            .store_err()?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s)
    }

    #[test]
    fn synced_then_deleted_is_monotonic() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = id("acme-ltd-anniv-2025");

        store.record_synced(&key, "g-1").unwrap();
        assert!(!store.is_deleted(&key).unwrap());
        assert_eq!(store.external_id_for(&key).unwrap().as_deref(), Some("g-1"));

        store.record_deleted(&key).unwrap();
        store.record_synced(&key, "g-2").unwrap();

        let tombstone = store.get_tombstone(&key).unwrap().unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.external_id.as_deref(), Some("g-2"));
    }

    #[test]
    fn deleting_unknown_id_creates_tombstone() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = id("globex-anniv-2026");
        assert!(store.get_tombstone(&key).unwrap().is_none());

        store.record_deleted(&key).unwrap();
        let tombstone = store.get_tombstone(&key).unwrap().unwrap();
        assert!(tombstone.is_deleted);
        assert!(tombstone.external_id.is_none());
        assert!(store.external_id_for(&key).unwrap().is_none());
    }

    #[test]
    fn lookup_by_external_id_and_listing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.record_synced(&id("event-2"), "g-2").unwrap();
        store.record_synced(&id("acme-ltd-anniv-2025"), "g-1").unwrap();

        let found = TombstoneTracker::find_by_external_id(&store, "g-2")
            .unwrap()
            .unwrap();
        assert_eq!(found.logical_id, id("event-2"));
        assert!(
            TombstoneTracker::find_by_external_id(&store, "nope")
                .unwrap()
                .is_none()
        );

        let keys: Vec<_> = store
            .list_tombstones()
            .unwrap()
            .into_iter()
            .map(|t| t.logical_id)
            .collect();
        assert_eq!(keys, vec![id("acme-ltd-anniv-2025"), id("event-2")]);
    }

    #[test]
    fn restore_clears_deletion_and_remote_identity() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = id("acme-ltd-anniv-2025");
        store.record_synced(&key, "g-1").unwrap();
        assert!(!store.restore(&key).unwrap());

        store.record_deleted(&key).unwrap();
        assert!(store.restore(&key).unwrap());
        let tombstone = store.get_tombstone(&key).unwrap().unwrap();
        assert!(!tombstone.is_deleted);
        assert!(tombstone.external_id.is_none());
        assert!(!store.restore(&key).unwrap());
    }
}
