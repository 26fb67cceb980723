//! Wire DTOs for the engine push direction.
//!
//! The engine speaks camelCase JSON with ISO-8601 dates and a 0..100
//! progress scale. Critical/slack fields never appear here: the engine
//! computes them, it is not configured with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use critpath_core::calendar::{Calendar, HourRange};
use critpath_core::resource::{Resource, ResourceKind};
use critpath_core::snapshot::ProjectSnapshot;
use critpath_core::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
    pub resource_id: String,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// 0..100 on the wire (the local model keeps 0..1).
    pub progress: f64,
    pub level: u32,
    pub summary: bool,
    pub milestone: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub predecessors: Vec<String>,
    pub children: Vec<String>,
    pub assignments: Vec<AssignmentDto>,
    pub notes: String,
    pub color: Option<String>,
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            start_date: task.start,
            end_date: task.end,
            progress: task.progress * 100.0,
            level: task.level,
            summary: task.summary,
            milestone: task.milestone,
            kind: task.kind.clone(),
            predecessors: task.predecessors.clone(),
            children: task.children.clone(),
            assignments: task
                .assignments
                .iter()
                .map(|a| AssignmentDto {
                    resource_id: a.resource_id.clone(),
                    units: a.units,
                })
                .collect(),
            notes: task.notes.clone(),
            color: task.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub calendar_id: String,
    pub standard_rate: f64,
    pub overtime_rate: f64,
    pub cost_per_use: f64,
}

impl From<&Resource> for ResourceDto {
    fn from(resource: &Resource) -> Self {
        Self {
            id: resource.id.clone(),
            name: resource.name.clone(),
            kind: resource.kind,
            calendar_id: resource.calendar_id.clone(),
            standard_rate: resource.standard_rate,
            overtime_rate: resource.overtime_rate,
            cost_per_use: resource.cost_per_use,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHoursDto {
    pub from_hour: u32,
    pub to_hour: u32,
}

impl From<&HourRange> for WorkingHoursDto {
    fn from(range: &HourRange) -> Self {
        Self {
            from_hour: range.from_hour,
            to_hour: range.to_hour,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDto {
    pub id: String,
    pub name: String,
    /// Working flags per weekday, Monday first.
    pub working_days: [bool; 7],
    pub working_hours: Vec<WorkingHoursDto>,
    pub hours_per_day: f64,
}

impl From<&Calendar> for CalendarDto {
    fn from(calendar: &Calendar) -> Self {
        Self {
            id: calendar.id.clone(),
            name: calendar.name.clone(),
            working_days: calendar.working_days,
            working_hours: calendar.working_hours.iter().map(Into::into).collect(),
            hours_per_day: calendar.hours_per_day,
        }
    }
}

/// The narrow preference projection the engine cares about. Pushed
/// opportunistically on every debounced trigger, independent of whether a
/// recomputation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub theme: String,
    pub hours_per_day: f64,
    /// Slack threshold (engine units) under which a task counts as critical.
    pub slack_limit: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            hours_per_day: 8.0,
            slack_limit: 0.0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectUpdateBody {
    tasks: Vec<TaskDto>,
    resources: Vec<ResourceDto>,
    calendars: Vec<CalendarDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imposed_finish_date: Option<DateTime<Utc>>,
}

/// Serializes a snapshot into the `project.update` body.
pub fn project_update_body(snapshot: &ProjectSnapshot) -> Result<Value, serde_json::Error> {
    serde_json::to_value(ProjectUpdateBody {
        tasks: snapshot.tasks.iter().map(TaskDto::from).collect(),
        resources: snapshot.resources.iter().map(ResourceDto::from).collect(),
        calendars: snapshot.calendars.iter().map(CalendarDto::from).collect(),
        imposed_finish_date: snapshot.imposed_finish,
    })
}
