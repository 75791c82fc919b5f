//! Event types for the local calendar.
//!
//! This module provides core types for representing locally owned events:
//! - [`CalendarEvent`]: A persisted event row with its sync state
//! - [`NewCalendarEvent`]: The insertable form of an event
//! - [`EventType`]: The closed set of event kinds and their display prefixes
//! - [`LogicalId`]: The stable identity used for tombstones and overrides

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Database identity of a persisted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic identity of a logical event.
///
/// Generated anniversaries use `<company-slug>-anniv-<year>`; persisted events
/// that do not override anything use `event-<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Logical identity of a persisted event with no override marker.
    pub fn for_event(id: EventId) -> Self {
        Self(format!("event-{}", id.0))
    }

    /// Logical identity of one year's anniversary for a company slug.
    pub fn for_anniversary(slug: &str, year: i32) -> Self {
        Self(format!("{slug}-anniv-{year}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this identity was produced by the anniversary generator.
    pub fn is_anniversary(&self) -> bool {
        self.0
            .rsplit_once("-anniv-")
            .is_some_and(|(_, year)| !year.is_empty() && year.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The kind of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Meeting,
    Deadline,
    Invoice,
    Reminder,
    /// Company registration anniversary, generated or manually overridden.
    Anniversary,
    /// Pulled from the remote calendar with no recognizable prefix.
    Imported,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        Self::Meeting,
        Self::Deadline,
        Self::Invoice,
        Self::Reminder,
        Self::Anniversary,
        Self::Imported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::Deadline => "deadline",
            Self::Invoice => "invoice",
            Self::Reminder => "reminder",
            Self::Anniversary => "anniversary",
            Self::Imported => "imported",
        }
    }

    /// Title prefix used on the remote calendar.
    ///
    /// Anniversaries and imported events keep their raw title.
    pub fn display_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Meeting => Some("[Meeting] "),
            Self::Deadline => Some("[Deadline] "),
            Self::Invoice => Some("[Invoice] "),
            Self::Reminder => Some("[Reminder] "),
            Self::Anniversary | Self::Imported => None,
        }
    }

    /// Title as written to the remote calendar.
    pub fn display_title(&self, title: &str) -> String {
        match self.display_prefix() {
            Some(prefix) => format!("{prefix}{title}"),
            None => title.to_string(),
        }
    }

    /// Splits a remote title into the event type its prefix names and the bare title.
    ///
    /// Titles without a known prefix are [`EventType::Imported`].
    pub fn from_display_title(display: &str) -> (EventType, &str) {
        Self::ALL
            .into_iter()
            .find_map(|kind| {
                let prefix = kind.display_prefix()?;
                display.strip_prefix(prefix).map(|rest| (kind, rest))
            })
            .unwrap_or((Self::Imported, display))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// Per-event sync state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
    /// Created locally, never pushed.
    #[default]
    Local,
    /// Edited locally, waiting for the next push.
    Pending,
    /// Present on the remote calendar under `external_id`.
    Synced,
    /// Soft-deleted.
    Deleted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Pending => "PENDING",
            Self::Synced => "SYNCED",
            Self::Deleted => "DELETED",
        }
    }

    /// Statuses eligible for a push.
    pub fn awaits_push(&self) -> bool {
        matches!(self, Self::Local | Self::Pending)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(Self::Local),
            "PENDING" => Ok(Self::Pending),
            "SYNCED" => Ok(Self::Synced),
            "DELETED" => Ok(Self::Deleted),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// Which local events a pass considers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Every event type, with the pull-missing and delete-stale phase.
    #[default]
    All,
    /// Only anniversary-typed or override-marked events; push only.
    Generated,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Generated => "generated",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "generated" => Ok(Self::Generated),
            other => Err(format!("unknown sync type: {other}")),
        }
    }
}

/// A locally owned calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub event_type: EventType,
    /// Generated occurrence this event supersedes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<LogicalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    /// Key under which this event's remote identity is tracked.
    pub fn tombstone_key(&self) -> LogicalId {
        self.overrides
            .clone()
            .unwrap_or_else(|| LogicalId::for_event(self.id))
    }

    pub fn display_title(&self) -> String {
        self.event_type.display_title(&self.title)
    }

    /// Not soft-deleted.
    pub fn is_live(&self) -> bool {
        self.sync_status != SyncStatus::Deleted
    }

    /// Anniversary-typed or carrying an override marker.
    pub fn is_generated_kind(&self) -> bool {
        self.event_type == EventType::Anniversary || self.overrides.is_some()
    }

    /// Returns true if this event matches a pass's type filter.
    pub fn matches_sync_type(&self, sync_type: SyncType) -> bool {
        match sync_type {
            SyncType::All => true,
            SyncType::Generated => self.is_generated_kind(),
        }
    }

    /// Returns true if the event was ever pushed or linked.
    pub fn was_synced(&self) -> bool {
        self.external_id.is_some() || self.last_synced_at.is_some()
    }
}

/// An event to insert into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCalendarEvent {
    pub title: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub event_type: EventType,
    pub overrides: Option<LogicalId>,
    pub external_id: Option<String>,
    pub sync_status: SyncStatus,
}

impl NewCalendarEvent {
    pub fn new(title: impl Into<String>, date: NaiveDate, event_type: EventType) -> Self {
        Self {
            title: title.into(),
            date,
            description: None,
            event_type,
            overrides: None,
            external_id: None,
            sync_status: SyncStatus::Local,
        }
    }

    /// Builds a local event pulled from the remote calendar.
    ///
    /// Known display prefixes are stripped and mapped back to their type.
    pub fn pulled(
        display_title: &str,
        date: NaiveDate,
        description: Option<String>,
        external_id: impl Into<String>,
    ) -> Self {
        let (event_type, title) = EventType::from_display_title(display_title);
        Self {
            title: title.to_string(),
            date,
            description,
            event_type,
            overrides: None,
            external_id: Some(external_id.into()),
            sync_status: SyncStatus::Synced,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks this event as superseding a generated occurrence.
    #[must_use]
    pub fn with_overrides(mut self, logical_id: LogicalId) -> Self {
        self.overrides = Some(logical_id);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.sync_status = status;
        self
    }
}

/// A company record, the input of the anniversary generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<NaiveDate>,
}

impl Company {
    pub fn new(id: i64, name: impl Into<String>, registration_date: Option<NaiveDate>) -> Self {
        Self {
            id,
            name: name.into(),
            registration_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(id: i64, event_type: EventType) -> CalendarEvent {
        let now = Utc::now();
        CalendarEvent {
            id: EventId(id),
            title: "Quarterly review".to_string(),
            date: date(2025, 4, 1),
            description: None,
            event_type,
            overrides: None,
            external_id: None,
            sync_status: SyncStatus::Local,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn logical_id_shapes() {
        assert_eq!(LogicalId::for_event(EventId(42)).as_str(), "event-42");
        let anniv = LogicalId::for_anniversary("acme-ltd", 2025);
        assert_eq!(anniv.as_str(), "acme-ltd-anniv-2025");
        assert!(anniv.is_anniversary());
        assert!(!LogicalId::for_event(EventId(1)).is_anniversary());
        assert!(!LogicalId::new("foo-anniv-").is_anniversary());
    }

    #[test]
    fn display_prefixes() {
        assert_eq!(EventType::Invoice.display_title("INV-7"), "[Invoice] INV-7");
        assert_eq!(
            EventType::Anniversary.display_title("Acme Ltd — 5th Anniversary"),
            "Acme Ltd — 5th Anniversary"
        );
        assert_eq!(EventType::Imported.display_title("Lunch"), "Lunch");
    }

    #[test]
    fn display_title_parses_back() {
        assert_eq!(
            EventType::from_display_title("[Deadline] VAT return"),
            (EventType::Deadline, "VAT return")
        );
        assert_eq!(
            EventType::from_display_title("Dentist"),
            (EventType::Imported, "Dentist")
        );
        assert_eq!(
            EventType::from_display_title("[Unknown] thing"),
            (EventType::Imported, "[Unknown] thing")
        );
    }

    #[test]
    fn pulled_event_strips_prefix() {
        let new = NewCalendarEvent::pulled("[Meeting] Board", date(2025, 5, 2), None, "ext-1");
        assert_eq!(new.title, "Board");
        assert_eq!(new.event_type, EventType::Meeting);
        assert_eq!(new.sync_status, SyncStatus::Synced);
        assert_eq!(new.external_id.as_deref(), Some("ext-1"));
    }

    #[test]
    fn tombstone_key_prefers_override() {
        let mut ev = event(7, EventType::Anniversary);
        assert_eq!(ev.tombstone_key().as_str(), "event-7");
        ev.overrides = Some(LogicalId::new("acme-ltd-anniv-2025"));
        assert_eq!(ev.tombstone_key().as_str(), "acme-ltd-anniv-2025");
    }

    #[test]
    fn sync_type_filter() {
        let meeting = event(1, EventType::Meeting);
        assert!(meeting.matches_sync_type(SyncType::All));
        assert!(!meeting.matches_sync_type(SyncType::Generated));

        let mut overriding = event(2, EventType::Meeting);
        overriding.overrides = Some(LogicalId::new("x-anniv-2025"));
        assert!(overriding.matches_sync_type(SyncType::Generated));

        assert!(event(3, EventType::Anniversary).matches_sync_type(SyncType::Generated));
    }

    #[test]
    fn enum_parsing() {
        assert_eq!("Invoice".parse::<EventType>().unwrap(), EventType::Invoice);
        assert!("party".parse::<EventType>().is_err());
        assert_eq!("synced".parse::<SyncStatus>().unwrap(), SyncStatus::Synced);
        assert_eq!("GENERATED".parse::<SyncType>().unwrap(), SyncType::Generated);
        assert!(SyncStatus::Pending.awaits_push());
        assert!(!SyncStatus::Synced.awaits_push());
    }

    #[test]
    fn serde_wire_names() {
        assert_eq!(serde_json::to_string(&SyncStatus::Deleted).unwrap(), "\"DELETED\"");
        assert_eq!(serde_json::to_string(&SyncType::Generated).unwrap(), "\"generated\"");
        assert_eq!(serde_json::to_string(&EventType::Anniversary).unwrap(), "\"anniversary\"");
        assert_eq!(serde_json::to_string(&EventId(3)).unwrap(), "3");
    }
}
