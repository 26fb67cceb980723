//! Point-in-time project snapshots for engine pushes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::resource::Resource;
use crate::task::Task;

/// An immutable projection of the project taken right before a push.
///
/// A fresh snapshot is built for every push; nothing mutates one after
/// construction. `project_id == None` means no project is open and the
/// push layer treats the snapshot as a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_id: Option<String>,
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
    pub calendars: Vec<Calendar>,
    /// Deadline imposed on the whole project, if any.
    pub imposed_finish: Option<DateTime<Utc>>,
}

impl ProjectSnapshot {
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            project_id,
            tasks: Vec::new(),
            resources: Vec::new(),
            calendars: Vec::new(),
            imposed_finish: None,
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_calendars(mut self, calendars: Vec<Calendar>) -> Self {
        self.calendars = calendars;
        self
    }

    pub fn with_imposed_finish(mut self, deadline: DateTime<Utc>) -> Self {
        self.imposed_finish = Some(deadline);
        self
    }

    /// Referential integrity of the projection.
    pub fn validate(&self) -> Result<(), String> {
        for resource in &self.resources {
            if !self.calendars.iter().any(|c| c.id == resource.calendar_id) {
                return Err(format!(
                    "resource '{}' references missing calendar '{}'",
                    resource.id, resource.calendar_id
                ));
            }
        }
        for task in &self.tasks {
            for pred in &task.predecessors {
                if !self.tasks.iter().any(|t| t.id == *pred) {
                    return Err(format!(
                        "task '{}' references missing predecessor '{}'",
                        task.id, pred
                    ));
                }
            }
        }
        Ok(())
    }
}
