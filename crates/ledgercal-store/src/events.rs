use chrono::{DateTime, NaiveDate, Utc};
use ledgercal_core::{
    CalendarEvent, EventId, EventQuery, EventStore, EventUpdate, LogicalId, NewCalendarEvent,
    StoreError, StoreResult, SyncStatus,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::debug;

use crate::error::SqlResultExt;
use crate::{SqliteStore, decode_ts, encode_ts};

const EVENT_COLUMNS: &str = "id, title, event_date, description, event_type, \
    overrides_logical_id, external_id, sync_status, last_synced_at, created_at, updated_at";

/// Raw column values, decoded into a [`CalendarEvent`] outside the row callback.
struct EventRow {
    id: i64,
    title: String,
    date: NaiveDate,
    description: Option<String>,
    event_type: String,
    overrides: Option<String>,
    external_id: Option<String>,
    sync_status: String,
    last_synced_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            date: row.get(2)?,
            description: row.get(3)?,
            event_type: row.get(4)?,
            overrides: row.get(5)?,
            external_id: row.get(6)?,
            sync_status: row.get(7)?,
            last_synced_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_event(self) -> StoreResult<CalendarEvent> {
        Ok(CalendarEvent {
            id: EventId(self.id),
            title: self.title,
            date: self.date,
            description: self.description,
            event_type: self.event_type.parse().map_err(StoreError::InvalidData)?,
            overrides: self.overrides.map(LogicalId::new),
            external_id: self.external_id,
            sync_status: self.sync_status.parse().map_err(StoreError::InvalidData)?,
            last_synced_at: self.last_synced_at.as_deref().map(decode_ts).transpose()?,
            created_at: decode_ts(&self.created_at)?,
            updated_at: decode_ts(&self.updated_at)?,
        })
    }
}

fn fetch_event(conn: &Connection, id: EventId) -> StoreResult<Option<CalendarEvent>> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = ?1"),
        [id.0],
        EventRow::from_row,
    )
    .optional()
    .store_err()?
    .map(EventRow::into_event)
    .transpose()
}

fn require_event(conn: &Connection, id: EventId) -> StoreResult<CalendarEvent> {
    fetch_event(conn, id)?.ok_or_else(|| StoreError::not_found("event", id))
}

/// Translates an [`EventQuery`] into a WHERE clause and its bound values.
fn query_filter(query: &EventQuery) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(window) = query.window {
        clauses.push("event_date >= ? AND event_date < ?".to_string());
        values.push(Value::Text(window.start.format("%Y-%m-%d").to_string()));
        values.push(Value::Text(window.end.format("%Y-%m-%d").to_string()));
    }

    if query.statuses.is_empty() {
        if !query.include_deleted {
            clauses.push("sync_status <> 'DELETED'".to_string());
        }
    } else {
        let marks = vec!["?"; query.statuses.len()].join(", ");
        clauses.push(format!("sync_status IN ({marks})"));
        values.extend(
            query
                .statuses
                .iter()
                .map(|status| Value::Text(status.as_str().to_string())),
        );
    }

    if let Some(kind) = query.event_type {
        clauses.push("event_type = ?".to_string());
        values.push(Value::Text(kind.as_str().to_string()));
    }

    if query.overrides_only {
        clauses.push("overrides_logical_id IS NOT NULL".to_string());
    }

    let filter = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (filter, values)
}

impl EventStore for SqliteStore {
    fn insert_event(&self, event: NewCalendarEvent) -> StoreResult<CalendarEvent> {
        let conn = self.conn()?;
        let now = encode_ts(Utc::now());
        let synced_at = event.external_id.as_ref().map(|_| now.clone());

        conn.execute(
            "INSERT INTO calendar_events (title, event_date, description, event_type, \
             overrides_logical_id, external_id, sync_status, last_synced_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                event.title,
                event.date,
                event.description,
                event.event_type.as_str(),
                event.overrides.as_ref().map(LogicalId::as_str),
                event.external_id,
                event.sync_status.as_str(),
                synced_at,
                now,
            ],
        )
        .store_err()?;

        let id = EventId(conn.last_insert_rowid());
        debug!(event_id = %id, "Inserted calendar event");
        require_event(&conn, id)
    }

    fn get_event(&self, id: EventId) -> StoreResult<Option<CalendarEvent>> {
        let conn = self.conn()?;
        fetch_event(&conn, id)
    }

    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<CalendarEvent>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events \
                 WHERE external_id = ?1 AND sync_status <> 'DELETED' ORDER BY id LIMIT 1"
            ),
            [external_id],
            EventRow::from_row,
        )
        .optional()
        .store_err()?
        .map(EventRow::into_event)
        .transpose()
    }

    fn list_events(&self, query: &EventQuery) -> StoreResult<Vec<CalendarEvent>> {
        let conn = self.conn()?;
        let (filter, values) = query_filter(query);
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events {filter} ORDER BY event_date, id"
        );

        let mut stmt = conn.prepare(&sql).store_err()?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), EventRow::from_row)
            .store_err()?
            .collect::<Result<Vec<_>, _>>()
            .store_err()?;
        rows.into_iter().map(EventRow::into_event).collect()
    }

    fn update_event(&self, id: EventId, update: EventUpdate) -> StoreResult<CalendarEvent> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().store_err()?;

        let mut event = require_event(&tx, id)?;
        if let Some(title) = update.title {
            event.title = title;
        }
        if let Some(date) = update.date {
            event.date = date;
        }
        if let Some(description) = update.description {
            event.description = description;
        }
        if let Some(event_type) = update.event_type {
            event.event_type = event_type;
        }

        tx.execute(
            "UPDATE calendar_events SET title = ?2, event_date = ?3, description = ?4, \
             event_type = ?5, updated_at = ?6 WHERE id = ?1",
            params![
                id.0,
                event.title,
                event.date,
                event.description,
                event.event_type.as_str(),
                encode_ts(Utc::now()),
            ],
        )
        .store_err()?;
        let updated = require_event(&tx, id)?;
        tx.commit().store_err()?;
        Ok(updated)
    }

    fn mark_synced(&self, id: EventId, external_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let at = encode_ts(at);
        let changed = self
            .conn()?
            .execute(
                "UPDATE calendar_events SET external_id = ?2, sync_status = ?3, \
                 last_synced_at = ?4, updated_at = ?4 WHERE id = ?1",
                params![id.0, external_id, SyncStatus::Synced.as_str(), at],
            )
            .store_err()?;
        if changed == 0 {
            return Err(StoreError::not_found("event", id));
        }
        Ok(())
    }

    fn mark_deleted(&self, id: EventId) -> StoreResult<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE calendar_events SET sync_status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.0, SyncStatus::Deleted.as_str(), encode_ts(Utc::now())],
            )
            .store_err()?;
        if changed == 0 {
            return Err(StoreError::not_found("event", id));
        }
        Ok(())
    }

    fn remove_event(&self, id: EventId) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().store_err()?;
        let Some(event) = fetch_event(&tx, id)? else {
            return Ok(false);
        };
        if event.was_synced() {
            return Err(StoreError::constraint(format!(
                "event {id} was synced and can only be soft-deleted"
            )));
        }
        let removed = tx
            .execute("DELETE FROM calendar_events WHERE id = ?1", [id.0])
            .store_err()?;
        tx.commit().store_err()?;
        Ok(removed > 0)
    }
}
