//! Workflow Timeline
//!
//! Records every transition a workflow instance goes through, for
//! debugging hosts and for tests that assert on ordering.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step became active
    Entered,
    /// Step input was handed to its action
    Submitted,
    /// Local validation refused the input
    Rejected,
    /// Action succeeded
    Succeeded,
    /// Action failed
    Failed,
    /// A completion arrived for an invocation that is no longer current
    Discarded,
    /// Countdown reached zero
    Expired,
    /// Previous step's action was re-invoked
    ResendRequested,
    /// Resend succeeded; countdown and code were reset
    Resent,
    /// Moved back to the previous step
    WentBack,
    /// Workflow was cancelled
    Cancelled,
    /// Workflow returned to its first step
    Restarted,
    /// Terminal step reached
    Completed,
}

impl EventType {
    /// Short lowercase name used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Entered => "entered",
            Self::Submitted => "submitted",
            Self::Rejected => "rejected",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Discarded => "discarded",
            Self::Expired => "expired",
            Self::ResendRequested => "resend requested",
            Self::Resent => "resent",
            Self::WentBack => "went back",
            Self::Cancelled => "cancelled",
            Self::Restarted => "restarted",
            Self::Completed => "completed",
        }
    }
}

/// A single event in the timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// ID of the step the event belongs to
    pub step_id: String,
    /// Type of event
    pub event_type: EventType,
    /// Monotonic time of the event
    pub timestamp: Instant,
    /// Wall-clock time of the event
    pub recorded_at: DateTime<Utc>,
}

/// Ordered record of a workflow instance's transitions.
#[derive(Debug, Clone)]
pub struct WorkflowTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl Default for WorkflowTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step_id: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            step_id: step_id.into(),
            event_type,
            timestamp: Instant::now(),
            recorded_at: Utc::now(),
        });
    }

    /// Returns all recorded events.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the most recent event.
    pub fn last(&self) -> Option<&TimelineEvent> {
        self.events.last()
    }

    /// Number of events of a given type.
    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Event types in recording order.
    pub fn event_types(&self) -> Vec<EventType> {
        self.events.iter().map(|e| e.event_type).collect()
    }

    /// Time since the timeline was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Renders one line per event with its offset from the start.
    pub fn report(&self) -> String {
        let mut output = String::from("\nWorkflow Timeline:\n\n");

        for event in &self.events {
            let offset = event.timestamp.duration_since(self.start_time);
            output.push_str(&format!(
                "  {:>8.2}s  {}  {:<14} {}\n",
                offset.as_secs_f64(),
                event.recorded_at.format("%H:%M:%S"),
                event.step_id,
                event.event_type.label()
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_records_in_order() {
        let mut timeline = WorkflowTimeline::new();
        timeline.add_event("credentials", EventType::Entered);
        timeline.add_event("credentials", EventType::Submitted);
        timeline.add_event("credentials", EventType::Succeeded);

        assert_eq!(
            timeline.event_types(),
            vec![EventType::Entered, EventType::Submitted, EventType::Succeeded]
        );
        assert_eq!(timeline.last().unwrap().step_id, "credentials");
    }

    #[test]
    fn test_count_by_type() {
        let mut timeline = WorkflowTimeline::new();
        timeline.add_event("otp", EventType::Failed);
        timeline.add_event("otp", EventType::Failed);
        timeline.add_event("otp", EventType::Succeeded);

        assert_eq!(timeline.count(EventType::Failed), 2);
        assert_eq!(timeline.count(EventType::Expired), 0);
    }

    #[test]
    fn test_report_lists_events() {
        let mut timeline = WorkflowTimeline::new();
        timeline.add_event("otp", EventType::Expired);

        let report = timeline.report();
        assert!(report.contains("Workflow Timeline"));
        assert!(report.contains("otp"));
        assert!(report.contains("expired"));
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = WorkflowTimeline::default();
        assert!(timeline.events().is_empty());
        assert!(timeline.last().is_none());
    }
}
