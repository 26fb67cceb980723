//! Structural edits on the task graph: predecessor links and outline moves.
//!
//! All functions here are pure: they take the outline-ordered task list and
//! return a fresh list, leaving the input untouched. Rejected edits are
//! values, not errors, so the store can surface them as no-ops.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Duration;

use crate::calendar::{Calendar, project_calendar};
use crate::task::Task;

/// Outcome of a link request.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    /// The edge was applied; the new task list is attached.
    Applied(Vec<Task>),
    /// The edge would close a cycle (or an id is unknown); model unchanged.
    Rejected,
}

/// Whether adding `predecessor_id` to `successor_id`'s predecessors keeps
/// the graph acyclic.
///
/// Walks the existing `predecessors` edges upward from the candidate
/// predecessor; reaching the candidate successor means the new edge would
/// close a cycle. Each node is visited at most once, so a graph that is
/// already malformed cannot loop the traversal.
pub fn is_valid_predecessor(tasks: &[Task], successor_id: &str, predecessor_id: &str) -> bool {
    if successor_id == predecessor_id {
        return false;
    }

    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(predecessor_id);

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        if current == successor_id {
            return false;
        }
        if let Some(task) = by_id.get(current) {
            for pred in &task.predecessors {
                if !visited.contains(pred.as_str()) {
                    queue.push_back(pred);
                }
            }
        }
    }

    true
}

/// Applies a predecessor edge, deriving a provisional start for the
/// successor when it currently begins on or before the predecessor finish.
///
/// The derived start is the next working day (project default calendar)
/// after the predecessor finish; the successor keeps its duration and its
/// segments shift by the same delta. A successor already starting after the
/// predecessor finish keeps its dates.
pub fn link(
    tasks: &[Task],
    predecessor_id: &str,
    successor_id: &str,
    calendars: &[Calendar],
) -> LinkOutcome {
    if !is_valid_predecessor(tasks, successor_id, predecessor_id) {
        return LinkOutcome::Rejected;
    }
    let Some(pred_idx) = position(tasks, predecessor_id) else {
        return LinkOutcome::Rejected;
    };
    let Some(succ_idx) = position(tasks, successor_id) else {
        return LinkOutcome::Rejected;
    };

    let mut next = tasks.to_vec();
    let pred_end = next[pred_idx].end;

    let successor = &mut next[succ_idx];
    if !successor.predecessors.iter().any(|p| p == predecessor_id) {
        successor.predecessors.push(predecessor_id.to_string());
    }

    if successor.start <= pred_end {
        let mut target = pred_end + Duration::days(1);
        if let Some(cal) = project_calendar(calendars) {
            target = cal.next_working_day(target);
        }
        let delta = target - successor.start;
        successor.shift(delta);
    }

    LinkOutcome::Applied(next)
}

/// Moves a task under its preceding sibling, one level deeper.
///
/// A task with no preceding sibling (first row, or first child of its
/// parent) has no valid target; the call is then an identity no-op.
pub fn indent(tasks: &[Task], task_id: &str) -> Vec<Task> {
    let Some(idx) = position(tasks, task_id) else {
        return tasks.to_vec();
    };
    let level = tasks[idx].level;

    let mut sibling_idx = None;
    for j in (0..idx).rev() {
        if tasks[j].level == level {
            sibling_idx = Some(j);
            break;
        }
        if tasks[j].level < level {
            break;
        }
    }
    let Some(sibling_idx) = sibling_idx else {
        return tasks.to_vec();
    };

    let mut next = tasks.to_vec();
    if let Some(old_parent) = parent_index(tasks, task_id) {
        next[old_parent].children.retain(|c| c != task_id);
    }
    next[sibling_idx].children.push(task_id.to_string());

    refresh_hierarchy(&next)
}

/// Moves a task out of its parent, becoming the parent's next sibling.
///
/// A top-level task has no parent to leave; the call is then an identity
/// no-op.
pub fn outdent(tasks: &[Task], task_id: &str) -> Vec<Task> {
    let Some(parent_idx) = parent_index(tasks, task_id) else {
        return tasks.to_vec();
    };

    let mut next = tasks.to_vec();
    next[parent_idx].children.retain(|c| c != task_id);

    let parent_id = next[parent_idx].id.clone();
    if let Some(grandparent_idx) = parent_index(tasks, &parent_id) {
        let siblings = &mut next[grandparent_idx].children;
        let at = siblings
            .iter()
            .position(|c| *c == parent_id)
            .map(|p| p + 1)
            .unwrap_or(siblings.len());
        siblings.insert(at, task_id.to_string());
    }

    refresh_hierarchy(&next)
}

/// Re-derives `summary` and `level` project-wide from the `children` lists.
///
/// `summary` is true iff a task has children. Levels start at 1 for roots
/// (tasks referenced by no children list) and grow by one per hierarchy
/// step; a visited guard keeps malformed child graphs from looping.
pub fn refresh_hierarchy(tasks: &[Task]) -> Vec<Task> {
    let mut next = tasks.to_vec();
    for task in &mut next {
        task.summary = !task.children.is_empty();
    }

    let index: HashMap<String, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.clone(), i))
        .collect();
    let referenced: HashSet<&str> = tasks
        .iter()
        .flat_map(|t| t.children.iter().map(String::as_str))
        .collect();

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, u32)> = tasks
        .iter()
        .filter(|t| !referenced.contains(t.id.as_str()))
        .map(|t| (t.id.clone(), 1))
        .collect();

    while let Some((id, level)) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(&i) = index.get(&id) else { continue };
        next[i].level = level;
        for child in &tasks[i].children {
            if !visited.contains(child) {
                queue.push_back((child.clone(), level + 1));
            }
        }
    }

    next
}

fn position(tasks: &[Task], id: &str) -> Option<usize> {
    tasks.iter().position(|t| t.id == id)
}

/// Index of the task whose `children` list contains `id`.
fn parent_index(tasks: &[Task], id: &str) -> Option<usize> {
    tasks
        .iter()
        .position(|t| t.children.iter().any(|c| c == id))
}
