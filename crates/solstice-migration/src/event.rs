//! Legacy event records, custom-table rows, and the ports between them.
//!
//! Strategies read events through [`EventSource`] and write normalized
//! rows through [`TableWriter`]; the real table schema and queries live
//! behind those ports. In-memory implementations ship for tests and the
//! CLI demo source.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StorageError;

/// Identifier of one event record in legacy storage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An event as it exists in legacy storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyEvent {
    /// Legacy record id.
    pub id: EventId,
    /// Event title.
    pub title: String,
    /// Start instant, UTC.
    pub start_utc: DateTime<Utc>,
    /// End instant, UTC.
    pub end_utc: DateTime<Utc>,
    /// Olson timezone name the event displays in.
    pub timezone: String,
    /// Whether the event spans whole days rather than a clock range.
    #[serde(default)]
    pub all_day: bool,
    /// Free-form legacy meta fields, carried along unchanged.
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// The normalized custom-table row an event migrates into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Id of the legacy event this row was derived from.
    pub event_id: EventId,
    /// Start instant, UTC.
    pub start_utc: DateTime<Utc>,
    /// End instant, UTC.
    pub end_utc: DateTime<Utc>,
    /// End minus start, in seconds; all-day events cover at least a day.
    pub duration_secs: i64,
    /// Olson timezone name.
    pub timezone: String,
    /// Whole-day flag.
    pub all_day: bool,
}

/// Read access to legacy events. Which ids get migrated is the driver's
/// decision; this port only resolves one id at a time.
pub trait EventSource: Send + Sync {
    /// Fetch the legacy event stored under `id`, if any.
    fn fetch(&self, id: EventId) -> Result<Option<LegacyEvent>, StorageError>;
}

/// Write access to the custom tables.
pub trait TableWriter: Send + Sync {
    /// Insert or replace the row for `row.event_id`.
    fn upsert(&self, row: &EventRow) -> Result<(), StorageError>;

    /// Remove the row for `id`. Removing an absent row is not an error.
    fn delete(&self, id: EventId) -> Result<(), StorageError>;
}

/// Event source over a fixed in-memory set.
#[derive(Debug, Default)]
pub struct MemoryEvents {
    events: HashMap<EventId, LegacyEvent>,
}

impl MemoryEvents {
    /// Build a source from a collection of legacy events.
    pub fn new(events: impl IntoIterator<Item = LegacyEvent>) -> Self {
        Self {
            events: events.into_iter().map(|event| (event.id, event)).collect(),
        }
    }
}

impl EventSource for MemoryEvents {
    fn fetch(&self, id: EventId) -> Result<Option<LegacyEvent>, StorageError> {
        Ok(self.events.get(&id).cloned())
    }
}

/// Custom-table stand-in keeping rows in memory.
#[derive(Debug, Default)]
pub struct MemoryTables {
    rows: Mutex<BTreeMap<EventId, EventRow>>,
}

impl MemoryTables {
    /// Create an empty table set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The row migrated for `id`, if any.
    pub fn row(&self, id: EventId) -> Option<EventRow> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.get(&id).cloned()
    }

    /// Number of migrated rows.
    pub fn len(&self) -> usize {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.len()
    }

    /// Whether no rows have been migrated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All migrated rows, ordered by event id.
    pub fn rows(&self) -> Vec<EventRow> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.values().cloned().collect()
    }
}

impl TableWriter for MemoryTables {
    fn upsert(&self, row: &EventRow) -> Result<(), StorageError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(row.event_id, row.clone());
        Ok(())
    }

    fn delete(&self, id: EventId) -> Result<(), StorageError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: u64) -> LegacyEvent {
        LegacyEvent {
            id: EventId(id),
            title: format!("Event {id}"),
            start_utc: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            timezone: "Europe/Berlin".to_string(),
            all_day: false,
            meta: Map::new(),
        }
    }

    #[test]
    fn memory_events_resolves_known_ids() {
        let source = MemoryEvents::new([event(1), event(2)]);
        assert_eq!(
            source.fetch(EventId(1)).unwrap().map(|e| e.title),
            Some("Event 1".to_string())
        );
        assert!(source.fetch(EventId(3)).unwrap().is_none());
    }

    #[test]
    fn memory_tables_upsert_replaces() {
        let tables = MemoryTables::new();
        let source = event(1);
        let mut row = EventRow {
            event_id: source.id,
            start_utc: source.start_utc,
            end_utc: source.end_utc,
            duration_secs: 7200,
            timezone: source.timezone.clone(),
            all_day: false,
        };

        tables.upsert(&row).unwrap();
        row.duration_secs = 3600;
        tables.upsert(&row).unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables.row(EventId(1)).unwrap().duration_secs, 3600);
    }

    #[test]
    fn deleting_absent_row_is_fine() {
        let tables = MemoryTables::new();
        tables.delete(EventId(9)).unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn legacy_event_meta_defaults_when_absent() {
        let json = r#"{
            "id": 5,
            "title": "Solstice party",
            "start_utc": "2024-06-21T18:00:00Z",
            "end_utc": "2024-06-21T23:00:00Z",
            "timezone": "UTC"
        }"#;
        let event: LegacyEvent = serde_json::from_str(json).unwrap();
        assert!(!event.all_day);
        assert!(event.meta.is_empty());
    }
}
