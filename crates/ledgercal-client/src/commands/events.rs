//! `ledgercal events`: local event management.

use std::fmt::Write as _;

use ledgercal_core::{
    CalendarEvent, DateWindow, EventId, EventQuery, EventStore, LocalDeletion, LogicalId,
    NewCalendarEvent, delete_local_event,
};
use ledgercal_store::SqliteStore;

use super::{Context, print_json};
use crate::cli::EventsAction;
use crate::error::{ClientError, ClientResult};

pub fn run(ctx: &Context, action: EventsAction) -> ClientResult<()> {
    let store = ctx.open_store()?;
    match action {
        EventsAction::Add {
            title,
            date,
            event_type,
            description,
            overrides,
        } => {
            let mut event = NewCalendarEvent::new(title, date, event_type);
            if let Some(description) = description {
                event = event.with_description(description);
            }
            if let Some(logical_id) = overrides {
                event = event.with_overrides(parse_anniversary_id(&logical_id)?);
            }
            let event = add(&store, event)?;
            println!("added event #{}: {}", event.id, event.display_title());
            Ok(())
        }
        EventsAction::List {
            from,
            to,
            event_type,
            all,
            json,
        } => {
            let mut query = EventQuery::live();
            if let (Some(from), Some(to)) = (from, to) {
                let window = DateWindow::new(from, to)
                    .map_err(|e| ClientError::invalid_argument(e.to_string()))?;
                query = query.in_window(window);
            }
            if let Some(kind) = event_type {
                query = query.with_type(kind);
            }
            if all {
                query = query.including_deleted();
            }

            let events = store.list_events(&query)?;
            if json {
                print_json(&events)
            } else {
                print!("{}", render(&events));
                Ok(())
            }
        }
        EventsAction::Delete { id } => {
            let message = match delete(&store, EventId(id))? {
                LocalDeletion::Removed => format!("removed event #{id}"),
                LocalDeletion::Tombstoned => format!(
                    "deleted event #{id}; the remote copy goes on the next full sync"
                ),
            };
            println!("{message}");
            Ok(())
        }
    }
}

/// Accepts only identities the anniversary generator can produce.
pub fn parse_anniversary_id(raw: &str) -> ClientResult<LogicalId> {
    let logical_id = LogicalId::new(raw.trim());
    if logical_id.is_anniversary() {
        Ok(logical_id)
    } else {
        Err(ClientError::invalid_argument(format!(
            "`{raw}` is not an anniversary id (expected <company-slug>-anniv-<year>)"
        )))
    }
}

pub fn add(store: &SqliteStore, event: NewCalendarEvent) -> ClientResult<CalendarEvent> {
    if event.title.trim().is_empty() {
        return Err(ClientError::invalid_argument("title must not be empty"));
    }
    Ok(store.insert_event(event)?)
}

pub fn delete(store: &SqliteStore, id: EventId) -> ClientResult<LocalDeletion> {
    Ok(delete_local_event(store, store, id)?)
}

pub fn render(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "no events\n".to_string();
    }
    let mut out = String::new();
    for event in events {
        let _ = write!(
            out,
            "#{:<5} {} {:<8} {}",
            event.id.0,
            event.date,
            event.sync_status.as_str(),
            event.display_title()
        );
        if let Some(overrides) = &event.overrides {
            let _ = write!(out, " (overrides {overrides})");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgercal_core::{EventType, SyncStatus, TombstoneTracker};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_and_render() {
        let store = SqliteStore::open_in_memory().unwrap();
        let event = add(
            &store,
            NewCalendarEvent::new("INV-7", date(2025, 6, 1), EventType::Invoice),
        )
        .unwrap();
        assert_eq!(event.sync_status, SyncStatus::Local);

        let text = render(&store.list_events(&EventQuery::live()).unwrap());
        assert_eq!(text, format!("#{:<5} 2025-06-01 LOCAL    [Invoice] INV-7\n", event.id.0));
    }

    #[test]
    fn blank_title_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = add(
            &store,
            NewCalendarEvent::new("  ", date(2025, 6, 1), EventType::Meeting),
        );
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[test]
    fn override_ids_must_be_anniversaries() {
        assert_eq!(
            parse_anniversary_id("acme-ltd-anniv-2025").unwrap(),
            LogicalId::new("acme-ltd-anniv-2025")
        );
        assert!(parse_anniversary_id("event-4").is_err());
        assert!(parse_anniversary_id("acme-ltd-anniv-").is_err());
    }

    #[test]
    fn delete_depends_on_sync_history() {
        let store = SqliteStore::open_in_memory().unwrap();
        let local = add(
            &store,
            NewCalendarEvent::new("Draft", date(2025, 5, 1), EventType::Reminder),
        )
        .unwrap();
        assert_eq!(delete(&store, local.id).unwrap(), LocalDeletion::Removed);
        assert!(store.get_event(local.id).unwrap().is_none());

        let synced = add(
            &store,
            NewCalendarEvent::new("Board", date(2025, 5, 2), EventType::Meeting),
        )
        .unwrap();
        store
            .mark_synced(synced.id, "g-1", chrono::Utc::now())
            .unwrap();
        assert_eq!(delete(&store, synced.id).unwrap(), LocalDeletion::Tombstoned);
        assert!(store.is_deleted(&synced.tombstone_key()).unwrap());

        assert!(matches!(
            delete(&store, EventId(999)),
            Err(ClientError::Store(_))
        ));
    }
}
