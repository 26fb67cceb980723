//! Working-time calendars and the calendar deletion cascade.
//!
//! Calendars are referenced by resources (and by link-date derivation), so
//! removing one is a structural edit: every resource bound to the removed
//! calendar must be re-pointed to the default calendar in the same atomic
//! edit. `compute_calendar_deletion` is the pure core of that edit.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// Well-known id of the default calendar. Never deletable.
pub const DEFAULT_CALENDAR_ID: &str = "standard";

/// A daily working-hour range, `from_hour..to_hour` in 0..=24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub from_hour: u32,
    pub to_hour: u32,
}

/// A working-time template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub name: String,
    /// Working flags per weekday, Monday first.
    pub working_days: [bool; 7],
    pub working_hours: Vec<HourRange>,
    pub hours_per_day: f64,
    /// Base calendars are never deletable.
    pub is_base: bool,
}

impl Calendar {
    /// Creates a Monday..Friday, 8h/day calendar.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            working_days: [true, true, true, true, true, false, false],
            working_hours: vec![
                HourRange {
                    from_hour: 8,
                    to_hour: 12,
                },
                HourRange {
                    from_hour: 13,
                    to_hour: 17,
                },
            ],
            hours_per_day: 8.0,
            is_base: false,
        }
    }

    /// The project default calendar.
    pub fn standard() -> Self {
        let mut cal = Self::new(DEFAULT_CALENDAR_ID, "Standard");
        cal.is_base = true;
        cal
    }

    pub fn with_working_days(mut self, days: [bool; 7]) -> Self {
        self.working_days = days;
        self
    }

    pub fn with_hours_per_day(mut self, hours: f64) -> Self {
        self.hours_per_day = hours;
        self
    }

    pub fn as_base(mut self) -> Self {
        self.is_base = true;
        self
    }

    pub fn is_working_day(&self, date: DateTime<Utc>) -> bool {
        self.working_days[date.weekday().num_days_from_monday() as usize]
    }

    /// Smallest instant at or after `from` that falls on a working day.
    ///
    /// A calendar with no working days at all returns `from` unchanged so
    /// callers never loop.
    pub fn next_working_day(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        if !self.working_days.iter().any(|&d| d) {
            return from;
        }
        let mut candidate = from;
        while !self.is_working_day(candidate) {
            candidate += Duration::days(1);
        }
        candidate
    }
}

/// Whether the user may delete this calendar at all.
///
/// Base calendars and the default calendar are protected; attempts to
/// delete them are rejected edits, not errors.
pub fn can_delete_calendar(calendar: &Calendar) -> bool {
    !calendar.is_base && calendar.id != DEFAULT_CALENDAR_ID
}

/// Result of deleting a calendar: the surviving calendar list, the
/// rewritten resource list, and the ids of resources that were re-pointed.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarCascade {
    pub calendars: Vec<Calendar>,
    pub resources: Vec<Resource>,
    /// Resources whose `calendar_id` was rewritten to the default.
    /// Downstream code can skip recomputation when this is empty.
    pub reassigned: Vec<String>,
}

/// Computes the state that results from deleting `deleted_id`.
///
/// Pure and total: a missing id is a no-op, every resource bound to the
/// deleted calendar lands on [`DEFAULT_CALENDAR_ID`], and untouched
/// resources are moved through unmodified. Callers guard protected
/// calendars with [`can_delete_calendar`] before invoking this.
pub fn compute_calendar_deletion(
    calendars: Vec<Calendar>,
    resources: Vec<Resource>,
    deleted_id: &str,
) -> CalendarCascade {
    let calendars: Vec<Calendar> = calendars
        .into_iter()
        .filter(|c| c.id != deleted_id)
        .collect();

    let mut reassigned = Vec::new();
    let resources: Vec<Resource> = resources
        .into_iter()
        .map(|mut r| {
            if r.calendar_id == deleted_id {
                r.calendar_id = DEFAULT_CALENDAR_ID.to_string();
                reassigned.push(r.id.clone());
            }
            r
        })
        .collect();

    CalendarCascade {
        calendars,
        resources,
        reassigned,
    }
}

/// The calendar used for link-date derivation: the default calendar when
/// present, else the first calendar in the project.
pub fn project_calendar(calendars: &[Calendar]) -> Option<&Calendar> {
    calendars
        .iter()
        .find(|c| c.id == DEFAULT_CALENDAR_ID)
        .or_else(|| calendars.first())
}
