//! Task model for the local project schedule.
//!
//! A task carries two kinds of schedule data: the dates the user chose
//! (`start`/`end`, never touched by reconciliation) and the advisory CPM
//! block the external engine computed (`cpm`, never touched by the user).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A sub-range of a split task. Segments are ordered and non-overlapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Assignment of a resource to a task. `units` is the allocation share
/// in 0.0..=1.0 (1.0 = full time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub resource_id: String,
    pub units: f64,
}

impl Assignment {
    pub fn new(resource_id: impl Into<String>, units: f64) -> Self {
        Self {
            resource_id: resource_id.into(),
            units,
        }
    }
}

/// Engine-computed scheduling advice. Written only by the reconciliation
/// merge, overwritten wholesale on each merge, cleared on project reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpmAdvice {
    pub early_start: DateTime<Utc>,
    pub early_finish: DateTime<Utc>,
    pub late_start: DateTime<Utc>,
    pub late_finish: DateTime<Utc>,
    pub critical: bool,
    pub total_slack: f64,
    /// Summary rows only: at least one descendant is on the critical path.
    pub contains_critical_children: bool,
    /// Summary rows only: smallest slack among descendants.
    pub min_child_slack: Option<f64>,
    /// The user placed this task earlier than its predecessors permit.
    pub dependency_violation: bool,
}

/// A schedulable task in the local store.
///
/// `summary` is derived (true iff `children` is non-empty) and `level` is
/// `1 + level(parent)` with roots at level 1; both are re-derived after
/// structural edits rather than trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Completion fraction in 0.0..=1.0.
    pub progress: f64,
    pub level: u32,
    pub summary: bool,
    pub milestone: bool,

    /// Task type echoed to the engine ("task", "project", ...).
    pub kind: String,
    /// Predecessor task ids, ordered, duplicate-free.
    pub predecessors: Vec<String>,
    /// Child task ids in outline order.
    pub children: Vec<String>,
    pub assignments: Vec<Assignment>,
    /// Present only when the task has been split.
    pub segments: Vec<Segment>,
    pub notes: String,
    pub color: Option<String>,

    /// Advisory block, owned by reconciliation.
    pub cpm: Option<CpmAdvice>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start,
            end,
            progress: 0.0,
            level: 1,
            summary: false,
            milestone: false,
            kind: "task".to_string(),
            predecessors: Vec::new(),
            children: Vec::new(),
            assignments: Vec::new(),
            segments: Vec::new(),
            notes: String::new(),
            color: None,
            cpm: None,
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_milestone(mut self, milestone: bool) -> Self {
        self.milestone = milestone;
        self
    }

    pub fn with_predecessor(mut self, id: impl Into<String>) -> Self {
        self.predecessors.push(id.into());
        self
    }

    pub fn with_child(mut self, id: impl Into<String>) -> Self {
        self.children.push(id.into());
        self.summary = true;
        self
    }

    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn with_segment(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.segments.push(Segment { start, end });
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// User-chosen duration.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Move the whole task by `delta`, keeping its duration.
    ///
    /// Every segment of a split task moves by the same delta so the split
    /// shape is preserved.
    pub fn shift(&mut self, delta: Duration) {
        self.start += delta;
        self.end += delta;
        for seg in &mut self.segments {
            seg.start += delta;
            seg.end += delta;
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}
