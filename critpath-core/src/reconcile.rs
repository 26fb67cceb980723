//! Merging engine CPM results into the local task set.
//!
//! The external engine owns early/late dates, slack and criticality; the
//! user owns `start`/`end`. [`apply_cpm_results`] reconciles the two: it
//! attaches the computed block to each matched task, flags placements that
//! violate a dependency, and never rewrites a user date. The merge is pure
//! and idempotent; callers commit its output to the store.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::task::{CpmAdvice, Task};

/// A task record echoed by the engine after recomputation.
///
/// The engine may key the record by either `id` or `uid`, and either may
/// arrive as a JSON string or number; dates arrive as ISO-8601 text.
/// Everything is optional because the record carries only what the engine
/// computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineTask {
    #[serde(deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub uid: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub early_start: Option<String>,
    pub early_finish: Option<String>,
    pub late_start: Option<String>,
    pub late_finish: Option<String>,
    pub progress: Option<f64>,
    pub critical: Option<bool>,
    pub total_slack: Option<f64>,
    pub contains_critical_children: Option<bool>,
    pub min_child_slack: Option<f64>,
    pub duration: Option<f64>,
}

impl EngineTask {
    /// Every id representation this record can be matched under.
    pub fn id_forms(&self) -> impl Iterator<Item = &str> {
        self.id.as_deref().into_iter().chain(self.uid.as_deref())
    }
}

/// Accepts a JSON string or number and folds both into a string.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

/// Default id normalization: trims surrounding whitespace.
///
/// The merge folds every id form (local and engine-side) through the same
/// normalization function before matching, so hosts whose engine echoes a
/// different textual form plug in their own function instead of patching
/// the merge.
pub fn default_id_normalize(id: &str) -> String {
    id.trim().to_string()
}

/// Lenient ISO-8601 parsing for engine-echoed dates.
fn parse_engine_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.and_utc());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc());
    }
    if let Ok(nd) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return nd.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
    }
    None
}

fn date_field(raw: &Option<String>) -> Option<DateTime<Utc>> {
    raw.as_deref().and_then(parse_engine_date)
}

/// Merges engine CPM results into the local task set.
///
/// Matched tasks get a fresh advisory block; their own `start`/`end` pass
/// through untouched, always. Engine records missing early/late dates fall
/// back to the engine's computed actual dates; a record missing those too
/// falls back to the local dates. Local tasks the engine did not echo pass
/// through unchanged.
pub fn apply_cpm_results(
    tasks: &[Task],
    engine_tasks: &[EngineTask],
    normalize: impl Fn(&str) -> String,
) -> Vec<Task> {
    let mut by_id: HashMap<String, &EngineTask> = HashMap::new();
    for record in engine_tasks {
        for form in record.id_forms() {
            by_id.insert(normalize(form), record);
        }
    }

    tasks
        .iter()
        .map(|task| {
            let Some(record) = by_id.get(&normalize(&task.id)) else {
                return task.clone();
            };

            let actual_start = date_field(&record.start_date);
            let actual_finish = date_field(&record.end_date);

            let early_start = date_field(&record.early_start)
                .or(actual_start)
                .unwrap_or(task.start);
            let early_finish = date_field(&record.early_finish)
                .or(actual_finish)
                .unwrap_or(task.end);
            let late_start = date_field(&record.late_start)
                .or(actual_start)
                .unwrap_or(task.start);
            let late_finish = date_field(&record.late_finish)
                .or(actual_finish)
                .unwrap_or(task.end);

            let mut out = task.clone();
            out.cpm = Some(CpmAdvice {
                early_start,
                early_finish,
                late_start,
                late_finish,
                critical: record.critical.unwrap_or(false),
                total_slack: record.total_slack.unwrap_or(0.0),
                contains_critical_children: record.contains_critical_children.unwrap_or(false),
                min_child_slack: record.min_child_slack,
                dependency_violation: starts_before_day(task.start, early_start),
            });
            out
        })
        .collect()
}

/// The user placed the task strictly before its earliest permitted start,
/// compared at calendar-day granularity.
fn starts_before_day(start: DateTime<Utc>, early_start: DateTime<Utc>) -> bool {
    start.date_naive() < early_start.date_naive()
}

/// Local best-effort CPM approximation, used when the engine is
/// unreachable.
///
/// A single forward pass in dependency order: early start is the latest
/// predecessor finish (a task without predecessors starts at its own
/// start), early finish adds the user duration. Late dates mirror the
/// early dates and slack/criticality keep whatever the last real merge
/// produced; only the engine computes those. Tasks on a malformed cycle
/// are left with their own dates.
pub fn local_cpm_estimate(tasks: &[Task]) -> Vec<Task> {
    let index: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    // Kahn's ordering over predecessor edges; unknown ids don't count.
    let mut indegree: Vec<usize> = tasks
        .iter()
        .map(|t| {
            t.predecessors
                .iter()
                .filter(|p| index.contains_key(p.as_str()))
                .count()
        })
        .collect();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, task) in tasks.iter().enumerate() {
        for pred in &task.predecessors {
            if let Some(&p) = index.get(pred.as_str()) {
                successors[p].push(i);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..tasks.len()).filter(|&i| indegree[i] == 0).collect();
    let mut finish: HashMap<usize, DateTime<Utc>> = HashMap::new();
    let mut out = tasks.to_vec();
    let mut resolved: HashSet<usize> = HashSet::new();

    while let Some(i) = queue.pop_front() {
        let task = &tasks[i];
        let latest_pred_finish = task
            .predecessors
            .iter()
            .filter_map(|p| index.get(p.as_str()))
            .filter_map(|p| finish.get(p))
            .max()
            .copied();

        let early_start = latest_pred_finish.unwrap_or(task.start);
        let early_finish = early_start + task.duration();
        finish.insert(i, early_finish);
        resolved.insert(i);

        let prior = task.cpm.as_ref();
        out[i].cpm = Some(CpmAdvice {
            early_start,
            early_finish,
            late_start: early_start,
            late_finish: early_finish,
            critical: prior.map(|c| c.critical).unwrap_or(false),
            total_slack: prior.map(|c| c.total_slack).unwrap_or(0.0),
            contains_critical_children: prior
                .map(|c| c.contains_critical_children)
                .unwrap_or(false),
            min_child_slack: prior.and_then(|c| c.min_child_slack),
            dependency_violation: starts_before_day(task.start, early_start),
        });

        for &s in &successors[i] {
            indegree[s] -= 1;
            if indegree[s] == 0 {
                queue.push_back(s);
            }
        }
    }

    // anything left sits on a cycle; leave it at its own dates
    for i in 0..tasks.len() {
        if !resolved.contains(&i) {
            out[i].cpm = tasks[i].cpm.clone();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 8, 0, 0).unwrap()
    }

    fn iso(d: u32) -> String {
        day(d).to_rfc3339()
    }

    fn record(id: &str) -> EngineTask {
        EngineTask {
            id: Some(id.to_string()),
            ..EngineTask::default()
        }
    }

    #[test]
    fn merge_never_touches_user_dates() {
        let tasks = vec![
            Task::new("a", "A", day(1), day(3)),
            Task::new("b", "B", day(2), day(5)).with_predecessor("a"),
        ];
        let engine = vec![
            EngineTask {
                early_start: Some(iso(1)),
                early_finish: Some(iso(3)),
                ..record("a")
            },
            EngineTask {
                early_start: Some(iso(4)),
                early_finish: Some(iso(7)),
                ..record("b")
            },
        ];

        let merged = apply_cpm_results(&tasks, &engine, default_id_normalize);
        for (before, after) in tasks.iter().zip(&merged) {
            assert_eq!(before.start, after.start);
            assert_eq!(before.end, after.end);
        }
    }

    #[test]
    fn early_placement_flags_dependency_violation() {
        // spec scenario: A day 1..3, B day 2..5 after A; engine says B may
        // start no earlier than day 4
        let tasks = vec![
            Task::new("a", "A", day(1), day(3)),
            Task::new("b", "B", day(2), day(5)).with_predecessor("a"),
        ];
        let engine = vec![EngineTask {
            early_start: Some(iso(4)),
            ..record("b")
        }];

        let merged = apply_cpm_results(&tasks, &engine, default_id_normalize);
        let b = merged[1].cpm.as_ref().unwrap();
        assert_eq!(merged[1].start, day(2));
        assert_eq!(b.early_start, day(4));
        assert!(b.dependency_violation);
        // A had no engine record and passes through untouched
        assert!(merged[0].cpm.is_none());
    }

    #[test]
    fn same_day_placement_is_not_a_violation() {
        let tasks = vec![Task::new("b", "B", day(4), day(6))];
        let engine = vec![EngineTask {
            // later in the day than the task start, but the same calendar day
            early_start: Some(Utc.with_ymd_and_hms(2026, 3, 4, 17, 0, 0).unwrap().to_rfc3339()),
            ..record("b")
        }];

        let merged = apply_cpm_results(&tasks, &engine, default_id_normalize);
        assert!(!merged[0].cpm.as_ref().unwrap().dependency_violation);
    }

    #[test]
    fn missing_early_dates_fall_back_to_actual_dates() {
        let tasks = vec![Task::new("a", "A", day(1), day(3))];
        let engine = vec![EngineTask {
            start_date: Some(iso(2)),
            end_date: Some(iso(4)),
            critical: Some(true),
            total_slack: Some(0.0),
            ..record("a")
        }];

        let merged = apply_cpm_results(&tasks, &engine, default_id_normalize);
        let advice = merged[0].cpm.as_ref().unwrap();
        assert_eq!(advice.early_start, day(2));
        assert_eq!(advice.early_finish, day(4));
        assert_eq!(advice.late_start, day(2));
        assert_eq!(advice.late_finish, day(4));
        assert!(advice.critical);
    }

    #[test]
    fn merge_is_idempotent() {
        let tasks = vec![
            Task::new("a", "A", day(1), day(3)),
            Task::new("b", "B", day(2), day(5)).with_predecessor("a"),
        ];
        let engine = vec![EngineTask {
            early_start: Some(iso(4)),
            total_slack: Some(2.5),
            ..record("b")
        }];

        let once = apply_cpm_results(&tasks, &engine, default_id_normalize);
        let twice = apply_cpm_results(&once, &engine, default_id_normalize);
        assert_eq!(once, twice);
    }

    #[test]
    fn numeric_uid_form_matches_local_id() {
        let tasks = vec![Task::new("7", "Seven", day(1), day(2))];
        let json = r#"[{"uid": 7, "earlyStart": "2026-03-05T08:00:00Z"}]"#;
        let engine: Vec<EngineTask> = serde_json::from_str(json).unwrap();

        let merged = apply_cpm_results(&tasks, &engine, default_id_normalize);
        assert!(merged[0].cpm.is_some());
    }

    #[test]
    fn custom_normalization_is_pluggable() {
        let tasks = vec![Task::new("Task_9", "Nine", day(1), day(2))];
        let engine = vec![record("task_9")];

        let plain = apply_cpm_results(&tasks, &engine, default_id_normalize);
        assert!(plain[0].cpm.is_none());

        let folded = apply_cpm_results(&tasks, &engine, |id| id.to_lowercase());
        assert!(folded[0].cpm.is_some());
    }

    #[test]
    fn engine_record_parses_iso_variants() {
        assert!(parse_engine_date("2026-03-04T08:00:00Z").is_some());
        assert!(parse_engine_date("2026-03-04T08:00:00+02:00").is_some());
        assert!(parse_engine_date("2026-03-04T08:00:00").is_some());
        assert!(parse_engine_date("2026-03-04 08:00:00").is_some());
        assert!(parse_engine_date("2026-03-04").is_some());
        assert!(parse_engine_date("not a date").is_none());
    }

    #[test]
    fn local_estimate_orders_by_dependencies() {
        let tasks = vec![
            Task::new("a", "A", day(1), day(3)),
            Task::new("b", "B", day(2), day(5)).with_predecessor("a"),
        ];

        let estimated = local_cpm_estimate(&tasks);
        let b = estimated[1].cpm.as_ref().unwrap();
        assert_eq!(b.early_start, day(3));
        assert!(b.dependency_violation);
        // user dates stay untouched here too
        assert_eq!(estimated[1].start, day(2));

        let a = estimated[0].cpm.as_ref().unwrap();
        assert_eq!(a.early_start, day(1));
        assert!(!a.dependency_violation);
    }

    #[test]
    fn local_estimate_keeps_prior_slack_and_criticality() {
        let mut task = Task::new("a", "A", day(1), day(3));
        task.cpm = Some(CpmAdvice {
            early_start: day(1),
            early_finish: day(3),
            late_start: day(1),
            late_finish: day(3),
            critical: true,
            total_slack: 1.5,
            contains_critical_children: false,
            min_child_slack: None,
            dependency_violation: false,
        });

        let estimated = local_cpm_estimate(&[task]);
        let advice = estimated[0].cpm.as_ref().unwrap();
        assert!(advice.critical);
        assert_eq!(advice.total_slack, 1.5);
    }

    #[test]
    fn local_estimate_leaves_cycle_members_alone() {
        let tasks = vec![
            Task::new("a", "A", day(1), day(3)).with_predecessor("b"),
            Task::new("b", "B", day(2), day(5)).with_predecessor("a"),
            Task::new("c", "C", day(1), day(2)),
        ];

        let estimated = local_cpm_estimate(&tasks);
        assert!(estimated[0].cpm.is_none());
        assert!(estimated[1].cpm.is_none());
        assert!(estimated[2].cpm.is_some());
    }
}
