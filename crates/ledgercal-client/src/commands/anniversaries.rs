//! `ledgercal anniversaries`: what the generator produces and what happens
//! to each occurrence.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use ledgercal_core::{
    CompanyDirectory, DateWindow, EventId, EventQuery, EventStore, LogicalId, TombstoneTracker,
    generate,
};
use ledgercal_store::SqliteStore;
use serde::Serialize;

use super::{Context, print_json};
use crate::cli::AnniversariesAction;
use crate::commands::events::parse_anniversary_id;
use crate::error::{ClientError, ClientResult};

/// Fate of one generated occurrence on the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OccurrenceState {
    /// Will be pushed or linked.
    Pending,
    /// Already on the remote calendar.
    Synced { external_id: String },
    /// A local event replaces it.
    Overridden { event_id: EventId },
    /// Dismissed or deleted; never pushed again.
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub logical_id: LogicalId,
    pub date: NaiveDate,
    pub title: String,
    #[serde(flatten)]
    pub state: OccurrenceState,
}

pub fn run(ctx: &Context, action: AnniversariesAction) -> ClientResult<()> {
    let store = ctx.open_store()?;
    match action {
        AnniversariesAction::Preview { year, json } => {
            let window = match year {
                Some(year) => DateWindow::year(year).ok_or_else(|| {
                    ClientError::invalid_argument(format!("year {year} is out of range"))
                })?,
                None => ctx
                    .config
                    .sync_defaults()
                    .window(ctx.today())
                    .map_err(|e| ClientError::config(e.to_string()))?,
            };
            let rows = preview(&store, &window)?;
            if json {
                print_json(&rows)
            } else {
                print!("{}", render(&window, &rows));
                Ok(())
            }
        }
        AnniversariesAction::Dismiss { logical_id } => {
            let logical_id = parse_anniversary_id(&logical_id)?;
            store.record_deleted(&logical_id)?;
            println!("dismissed {logical_id}");
            Ok(())
        }
        AnniversariesAction::Restore { logical_id } => {
            let logical_id = parse_anniversary_id(&logical_id)?;
            if store.restore(&logical_id)? {
                println!("restored {logical_id}; it is pushed on the next sync");
            } else {
                println!("{logical_id} was not dismissed");
            }
            Ok(())
        }
    }
}

/// Classifies every occurrence the generator yields for `window`.
pub fn preview(store: &SqliteStore, window: &DateWindow) -> ClientResult<Vec<PreviewRow>> {
    let mut overrides: HashMap<LogicalId, EventId> = HashMap::new();
    for event in store.list_events(&EventQuery::live().overrides_only())? {
        if let Some(logical_id) = event.overrides {
            let holder = overrides.entry(logical_id).or_insert(event.id);
            *holder = (*holder).min(event.id);
        }
    }

    let occurrences = generate(&store.list_companies()?, window);
    let mut rows = Vec::with_capacity(occurrences.len());
    for occurrence in occurrences {
        let state = if let Some(&event_id) = overrides.get(&occurrence.logical_id) {
            OccurrenceState::Overridden { event_id }
        } else {
            match store.get_tombstone(&occurrence.logical_id)? {
                Some(t) if t.is_deleted => OccurrenceState::Dismissed,
                Some(t) => match t.external_id {
                    Some(external_id) => OccurrenceState::Synced { external_id },
                    None => OccurrenceState::Pending,
                },
                None => OccurrenceState::Pending,
            }
        };
        rows.push(PreviewRow {
            logical_id: occurrence.logical_id,
            date: occurrence.date,
            title: occurrence.title,
            state,
        });
    }
    Ok(rows)
}

pub fn render(window: &DateWindow, rows: &[PreviewRow]) -> String {
    let mut out = format!("anniversaries in {window}:\n");
    if rows.is_empty() {
        out.push_str("  none\n");
    }
    for row in rows {
        let state = match &row.state {
            OccurrenceState::Pending => "pending".to_string(),
            OccurrenceState::Synced { external_id } => format!("synced as {external_id}"),
            OccurrenceState::Overridden { event_id } => format!("overridden by #{event_id}"),
            OccurrenceState::Dismissed => "dismissed".to_string(),
        };
        let _ = writeln!(out, "  {} {} [{}] {}", row.date, row.title, row.logical_id, state);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgercal_core::{EventType, NewCalendarEvent};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_company("Acme Ltd", Some(date(2020, 3, 1))).unwrap();
        store.insert_company("Beta GmbH", Some(date(2019, 7, 15))).unwrap();
        store.insert_company("No Date Co", None).unwrap();
        store
    }

    fn states(rows: &[PreviewRow]) -> Vec<(&str, &OccurrenceState)> {
        rows.iter().map(|r| (r.logical_id.as_str(), &r.state)).collect()
    }

    #[test]
    fn fresh_occurrences_are_pending() {
        let rows = preview(&store(), &DateWindow::year(2025).unwrap()).unwrap();
        assert_eq!(
            states(&rows),
            vec![
                ("acme-ltd-anniv-2025", &OccurrenceState::Pending),
                ("beta-gmbh-anniv-2025", &OccurrenceState::Pending),
            ]
        );
        assert_eq!(rows[0].title, "Acme Ltd — 5th Anniversary");
    }

    #[test]
    fn synced_dismissed_and_overridden() {
        let store = store();
        let acme = LogicalId::new("acme-ltd-anniv-2025");
        let beta = LogicalId::new("beta-gmbh-anniv-2025");
        store.record_synced(&acme, "g-acme").unwrap();
        store.record_deleted(&beta).unwrap();

        let rows = preview(&store, &DateWindow::year(2025).unwrap()).unwrap();
        assert_eq!(
            states(&rows),
            vec![
                (
                    "acme-ltd-anniv-2025",
                    &OccurrenceState::Synced {
                        external_id: "g-acme".into()
                    }
                ),
                ("beta-gmbh-anniv-2025", &OccurrenceState::Dismissed),
            ]
        );

        let party = store
            .insert_event(
                NewCalendarEvent::new("Acme party", date(2025, 3, 7), EventType::Anniversary)
                    .with_overrides(acme.clone()),
            )
            .unwrap();
        let rows = preview(&store, &DateWindow::year(2025).unwrap()).unwrap();
        assert_eq!(rows[0].state, OccurrenceState::Overridden { event_id: party.id });

        let text = render(&DateWindow::year(2025).unwrap(), &rows);
        assert!(text.starts_with("anniversaries in [2025-01-01, 2026-01-01):\n"));
        assert!(text.contains(&format!("[acme-ltd-anniv-2025] overridden by #{}", party.id)));
    }

    #[test]
    fn restore_reverses_dismiss() {
        let store = store();
        let acme = LogicalId::new("acme-ltd-anniv-2025");
        store.record_deleted(&acme).unwrap();
        assert!(store.restore(&acme).unwrap());

        let rows = preview(&store, &DateWindow::year(2025).unwrap()).unwrap();
        assert_eq!(rows[0].state, OccurrenceState::Pending);
    }
}
