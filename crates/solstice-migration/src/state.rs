//! Persisted migration state.
//!
//! The state record is a process-wide singleton hydrated from the durable
//! store at construction and written back only on an explicit [`save`].
//! Phase queries gate the worker and admin layers; the free-form extension
//! data is reachable through generic key-path accessors.
//!
//! [`save`]: MigrationState::save

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{MigrationError, Phase, StateStore, StorageError};

/// The single durable-store key holding the whole state record.
pub const STATE_OPTION_KEY: &str = "ct1_migration_state";

/// The serialized shape of the state record.
///
/// Unknown keys land in `extra` and survive a load/save round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateData {
    phase: Phase,
    complete_timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for StateData {
    fn default() -> Self {
        Self {
            phase: Phase::default(),
            complete_timestamp: None,
            extra: Map::new(),
        }
    }
}

impl StateData {
    /// The defaults record the state hydrates from when nothing is stored.
    fn default_record() -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("complete_timestamp".to_string(), Value::Null);
        record.insert(
            "phase".to_string(),
            Value::String(Phase::default().as_str().to_string()),
        );
        record
    }
}

/// Read/write access to the persisted migration state.
pub struct MigrationState {
    store: Arc<dyn StateStore>,
    data: StateData,
}

impl MigrationState {
    /// Phases counted as completed. `MigrationPrompt` doubles as "preview
    /// complete" here; extend this set rather than the method body.
    pub const COMPLETED_PHASES: [Phase; 2] = [Phase::MigrationComplete, Phase::MigrationPrompt];

    /// Phases with worker actions in flight.
    pub const RUNNING_PHASES: [Phase; 3] = [
        Phase::MigrationInProgress,
        Phase::PreviewInProgress,
        Phase::UndoInProgress,
    ];

    /// Phases that lock the site for maintenance. Narrower than
    /// [`RUNNING_PHASES`]: a preview does not lock.
    ///
    /// [`RUNNING_PHASES`]: Self::RUNNING_PHASES
    pub const MAINTENANCE_PHASES: [Phase; 2] =
        [Phase::MigrationInProgress, Phase::UndoInProgress];

    /// Hydrate the state from the durable store.
    ///
    /// An absent record is the normal first-run case and yields the
    /// defaults. A present record merges over the defaults, stored values
    /// winning. A record with an impossible shape or phase fails with
    /// [`MigrationError::CorruptState`].
    pub fn load(store: Arc<dyn StateStore>) -> Result<Self, MigrationError> {
        let data = match store.get(STATE_OPTION_KEY)? {
            None => StateData::default(),
            Some(stored) => hydrate(stored)?,
        };
        Ok(Self { store, data })
    }

    /// The current migration phase.
    pub fn phase(&self) -> Phase {
        self.data.phase
    }

    /// Move to a new phase. Takes effect in durable storage only on
    /// [`save`](Self::save).
    pub fn set_phase(&mut self, phase: Phase) {
        self.data.phase = phase;
    }

    /// When the migration completed, if it has.
    pub fn complete_timestamp(&self) -> Option<DateTime<Utc>> {
        self.data.complete_timestamp
    }

    /// Record (or clear) the completion time.
    pub fn set_complete_timestamp(&mut self, at: Option<DateTime<Utc>>) {
        self.data.complete_timestamp = at;
    }

    /// Whether the migration is completed.
    pub fn is_completed(&self) -> bool {
        Self::COMPLETED_PHASES.contains(&self.data.phase)
    }

    /// Whether the migration process can be undone.
    ///
    /// Always `false` in this version. Reserved; callers depend on the
    /// stable answer, so this is not dead code.
    pub fn can_be_undone(&self) -> bool {
        false
    }

    /// Whether there is work being done. Wider than an in-progress
    /// migration: previews and undos count too.
    pub fn is_running(&self) -> bool {
        Self::RUNNING_PHASES.contains(&self.data.phase)
    }

    /// Whether the site should be locked for maintenance.
    pub fn should_lock_for_maintenance(&self) -> bool {
        Self::MAINTENANCE_PHASES.contains(&self.data.phase)
    }

    /// Whether the migration is required.
    ///
    /// Always `true` in this version. Reserved, like
    /// [`can_be_undone`](Self::can_be_undone).
    pub fn is_required(&self) -> bool {
        true
    }

    /// Look up a value in the free-form extension data by key path.
    ///
    /// Returns `None` when any segment of the path is absent; absent keys
    /// are expected input, not an error.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.data.extra.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    /// Like [`get`](Self::get) but resolving an absent path to `default`.
    pub fn get_or<'a>(&'a self, path: &[&str], default: &'a Value) -> &'a Value {
        self.get(path).unwrap_or(default)
    }

    /// Assign a value in the free-form extension data, creating (or
    /// replacing) intermediate objects as needed. Mutates only the
    /// in-memory record; an empty path is ignored.
    ///
    /// The reserved record keys (`phase`, `complete_timestamp`) have typed
    /// accessors and always win over same-named free-form entries when the
    /// record is serialized.
    pub fn set(&mut self, path: &[&str], value: impl Into<Value>) {
        set_path(&mut self.data.extra, path, value.into());
    }

    /// Persist the whole in-memory record under [`STATE_OPTION_KEY`],
    /// overwriting the prior value.
    ///
    /// There is no merge on save: concurrent writers race and the last
    /// writer wins. The driver is expected to serialize saves, e.g. with a
    /// single-flight lock at the queue level.
    pub fn save(&self) -> Result<(), MigrationError> {
        let record = self.to_record()?;
        self.store.set(STATE_OPTION_KEY, &record)?;
        Ok(())
    }

    /// Serialize the record with the typed fields authoritative over any
    /// same-named free-form entries.
    fn to_record(&self) -> Result<Value, StorageError> {
        let mut record = self.data.extra.clone();
        record.insert(
            "phase".to_string(),
            Value::String(self.data.phase.as_str().to_string()),
        );
        record.insert(
            "complete_timestamp".to_string(),
            serde_json::to_value(self.data.complete_timestamp)?,
        );
        Ok(Value::Object(record))
    }
}

impl fmt::Debug for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationState")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// Merge a stored record over the defaults and decode it.
fn hydrate(stored: Value) -> Result<StateData, MigrationError> {
    let stored = match stored {
        Value::Object(map) => map,
        other => {
            return Err(MigrationError::CorruptState(format!(
                "stored record is not an object (found {})",
                value_kind(&other)
            )));
        }
    };

    let mut record = StateData::default_record();
    for (key, value) in stored {
        record.insert(key, value);
    }

    serde_json::from_value(Value::Object(record))
        .map_err(|err| MigrationError::CorruptState(err.to_string()))
}

/// Nested assignment over a JSON object map. Non-object intermediates are
/// replaced, matching overwrite-on-save semantics at the leaf level.
fn set_path(target: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = target
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                set_path(map, rest, value);
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
