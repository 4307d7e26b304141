//! Monitoring Module
//!
//! Observability for running workflows.
//!
//! # Components
//!
//! - [`WorkflowTimeline`]: ordered record of step transitions

pub mod timeline;

pub use timeline::{EventType, TimelineEvent, WorkflowTimeline};
