//! Per-event migration outcome reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::EventId;

/// Outcome of one event's migration attempt. Exactly one of these holds at
/// any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// No strategy has touched the event yet.
    #[default]
    NotAttempted,
    /// The event's data was migrated (or deliberately skipped).
    Success,
    /// The strategy could not migrate the event.
    Failure,
}

/// Mutable outcome record for one event's migration attempt.
///
/// The driver owns the report and threads it through a strategy's `apply`;
/// strategies record the outcome and hand the same report back for
/// aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    event_id: EventId,
    outcome: MigrationOutcome,
    strategy: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl EventReport {
    /// Start a report for `event_id` with nothing attempted yet.
    pub fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            outcome: MigrationOutcome::NotAttempted,
            strategy: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// The event this report describes.
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// The current outcome.
    pub fn outcome(&self) -> MigrationOutcome {
        self.outcome
    }

    /// Whether the attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == MigrationOutcome::Success
    }

    /// Whether the attempt failed.
    pub fn is_failure(&self) -> bool {
        self.outcome == MigrationOutcome::Failure
    }

    /// Slug of the strategy that handled the event, once one has.
    pub fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    /// The failure reason, when failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When this report was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Note which strategy is handling the event.
    pub fn record_strategy(&mut self, slug: &str) {
        self.strategy = Some(slug.to_string());
    }

    /// Record a successful migration, clearing any earlier failure.
    pub fn migration_success(&mut self) {
        self.outcome = MigrationOutcome::Success;
        self.error = None;
    }

    /// Record a failed migration with its reason.
    pub fn migration_failed(&mut self, reason: impl Into<String>) {
        self.outcome = MigrationOutcome::Failure;
        self.error = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_report_is_not_attempted() {
        let report = EventReport::new(EventId(1));
        assert_eq!(report.outcome(), MigrationOutcome::NotAttempted);
        assert!(!report.is_success());
        assert!(!report.is_failure());
        assert!(report.error().is_none());
        assert!(report.strategy().is_none());
    }

    #[test]
    fn success_and_failure_are_exclusive() {
        let mut report = EventReport::new(EventId(1));

        report.migration_failed("legacy row unreadable");
        assert!(report.is_failure());
        assert_eq!(report.error(), Some("legacy row unreadable"));

        report.migration_success();
        assert!(report.is_success());
        assert!(!report.is_failure());
        assert!(report.error().is_none());
    }

    #[test]
    fn strategy_slug_is_recorded() {
        let mut report = EventReport::new(EventId(7));
        report.record_strategy("some-strategy");
        assert_eq!(report.strategy(), Some("some-strategy"));
    }
}
