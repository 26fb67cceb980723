//! Store seam between the host application and the bridge.
//!
//! The local model is single-writer: edits and reconciliation commits both
//! go through the store, and commits replace whole collections rather than
//! mutating rows in place.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use critpath_core::calendar::Calendar;
use critpath_core::resource::Resource;
use critpath_core::snapshot::ProjectSnapshot;
use critpath_core::task::Task;

use crate::wire::EngineConfig;

/// What the bridge needs from the host's store.
pub trait ScheduleStore: Send + Sync {
    /// Immutable projection for the next push.
    fn snapshot(&self) -> ProjectSnapshot;
    /// Current local tasks.
    fn tasks(&self) -> Vec<Task>;
    /// Atomically replaces the task collection (reconciliation commit).
    /// Does not mark the store dirty: merges attach engine advice, they are
    /// not user edits.
    fn replace_tasks(&self, tasks: Vec<Task>);
    /// Marks local edits as not yet pushed.
    fn mark_dirty(&self);
    /// Clears and returns the dirty flag.
    fn take_dirty(&self) -> bool;
    /// Engine-facing preference projection.
    fn engine_config(&self) -> EngineConfig;
}

/// Mutable project state held by [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    pub project_id: Option<String>,
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
    pub calendars: Vec<Calendar>,
    pub imposed_finish: Option<DateTime<Utc>>,
    pub config: EngineConfig,
}

/// In-memory single-writer store, enough to embed the bridge without a
/// host application (and to test it).
pub struct MemoryStore {
    state: RwLock<ProjectState>,
    dirty: AtomicBool,
}

impl MemoryStore {
    pub fn new(state: ProjectState) -> Self {
        Self {
            state: RwLock::new(state),
            dirty: AtomicBool::new(false),
        }
    }

    /// Applies a user edit and marks the store dirty.
    pub fn update(&self, edit: impl FnOnce(&mut ProjectState)) {
        let mut state = self.state.write().expect("store lock poisoned");
        edit(&mut state);
        self.dirty.store(true, Ordering::SeqCst);
    }
}

impl ScheduleStore for MemoryStore {
    fn snapshot(&self) -> ProjectSnapshot {
        let state = self.state.read().expect("store lock poisoned");
        ProjectSnapshot {
            project_id: state.project_id.clone(),
            tasks: state.tasks.clone(),
            resources: state.resources.clone(),
            calendars: state.calendars.clone(),
            imposed_finish: state.imposed_finish,
        }
    }

    fn tasks(&self) -> Vec<Task> {
        self.state.read().expect("store lock poisoned").tasks.clone()
    }

    fn replace_tasks(&self, tasks: Vec<Task>) {
        self.state.write().expect("store lock poisoned").tasks = tasks;
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    fn engine_config(&self) -> EngineConfig {
        self.state.read().expect("store lock poisoned").config.clone()
    }
}
