//! critpath-bridge: asynchronous bridge between the local schedule store
//! and the external CPM scheduling engine.
//!
//! The bridge owns the ordering problems: snapshot pushes are FIFO and
//! mutually exclusive, recomputation is debounced and single-flight, and
//! engine results are merged without ever rewriting a user-chosen date.

pub mod channel;
pub mod recalc;
pub mod store;
pub mod sync;
pub mod trigger;
pub mod wire;

#[cfg(test)]
pub(crate) mod testutil;

pub use channel::{EngineChannel, EngineError};
pub use recalc::{recalculate_critical_path, recalculate_with};
pub use store::{MemoryStore, ProjectState, ScheduleStore};
pub use sync::SyncService;
pub use trigger::{PrefCategory, PrefChange, RecalcTrigger};
pub use wire::{CalendarDto, EngineConfig, ResourceDto, TaskDto, project_update_body};
