//! Resource model: people, machines, materials, lump costs.

use serde::{Deserialize, Serialize};

use crate::calendar::DEFAULT_CALENDAR_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Work,
    Material,
    Cost,
}

/// A resource that can be assigned to tasks.
///
/// `calendar_id` must always resolve to an existing calendar; the deletion
/// cascade in `crate::calendar` keeps that true when calendars go away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub calendar_id: String,
    pub standard_rate: f64,
    pub overtime_rate: f64,
    pub cost_per_use: f64,
}

impl Resource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            standard_rate: 0.0,
            overtime_rate: 0.0,
            cost_per_use: 0.0,
        }
    }

    pub fn with_calendar(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_standard_rate(mut self, rate: f64) -> Self {
        self.standard_rate = rate;
        self
    }

    pub fn with_overtime_rate(mut self, rate: f64) -> Self {
        self.overtime_rate = rate;
        self
    }

    pub fn with_cost_per_use(mut self, cost: f64) -> Self {
        self.cost_per_use = cost;
        self
    }
}
