//! critpath-core: domain model and reconciliation logic for the critpath
//! schedule-synchronization subsystem.
//!
//! Everything in this crate is synchronous and pure; the asynchronous
//! engine bridge lives in `critpath-bridge`.

pub mod calendar;
pub mod dependency;
pub mod reconcile;
pub mod resource;
pub mod snapshot;
pub mod task;

pub use calendar::{
    Calendar, CalendarCascade, DEFAULT_CALENDAR_ID, HourRange, can_delete_calendar,
    compute_calendar_deletion, project_calendar,
};
pub use dependency::{LinkOutcome, indent, is_valid_predecessor, link, outdent, refresh_hierarchy};
pub use reconcile::{EngineTask, apply_cpm_results, default_id_normalize, local_cpm_estimate};
pub use resource::{Resource, ResourceKind};
pub use snapshot::ProjectSnapshot;
pub use task::{Assignment, CpmAdvice, Segment, Task};
