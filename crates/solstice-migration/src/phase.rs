//! Migration phase enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MigrationError;

/// The step the overall migration is in. Exactly one phase is active at a
/// time and it is the sole required field of the persisted state record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// First step: the preview has not been started yet.
    #[default]
    PreviewPrompt,
    /// A preview pass is running.
    PreviewInProgress,
    /// Preview finished; waiting for the go-ahead to migrate.
    MigrationPrompt,
    /// The migration pass is running.
    MigrationInProgress,
    /// Final step: all events migrated.
    MigrationComplete,
    /// A running pass is being cancelled.
    CancellationInProgress,
    /// A completed migration is being reversed.
    UndoInProgress,
}

impl Phase {
    /// All phases, in workflow order.
    pub const ALL: [Phase; 7] = [
        Phase::PreviewPrompt,
        Phase::PreviewInProgress,
        Phase::MigrationPrompt,
        Phase::MigrationInProgress,
        Phase::MigrationComplete,
        Phase::CancellationInProgress,
        Phase::UndoInProgress,
    ];

    /// The wire string stored in the durable record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreviewPrompt => "preview-prompt",
            Phase::PreviewInProgress => "preview-in-progress",
            Phase::MigrationPrompt => "migration-prompt",
            Phase::MigrationInProgress => "migration-in-progress",
            Phase::MigrationComplete => "migration-complete",
            Phase::CancellationInProgress => "cancellation-in-progress",
            Phase::UndoInProgress => "undo-in-progress",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| MigrationError::CorruptState(format!("impossible phase '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
    }

    #[test]
    fn serde_matches_wire_strings() {
        for phase in Phase::ALL {
            let json = serde_json::to_value(phase).unwrap();
            assert_eq!(json, serde_json::Value::String(phase.as_str().to_string()));
        }
    }

    #[test]
    fn unknown_phase_is_corrupt() {
        let err = "migration-paused".parse::<Phase>().unwrap_err();
        assert!(matches!(err, MigrationError::CorruptState(_)));
    }

    #[test]
    fn default_is_preview_prompt() {
        assert_eq!(Phase::default(), Phase::PreviewPrompt);
    }
}
