//! One full recomputation cycle: push if dirty, recalculate, merge, commit.

use anyhow::{Context, Result};
use serde_json::json;

use critpath_core::dependency::refresh_hierarchy;
use critpath_core::reconcile::{EngineTask, apply_cpm_results, default_id_normalize};

use crate::channel::{EngineChannel, EngineError};
use crate::store::ScheduleStore;
use crate::sync::SyncService;

/// Runs one recomputation cycle with the default id normalization.
///
/// Nothing is committed unless every stage succeeds: a push failure leaves
/// the store dirty, and an engine response without a task list aborts the
/// cycle with [`EngineError::InvalidResponse`] before any merge.
pub async fn recalculate_critical_path<S>(
    store: &S,
    sync: &SyncService,
    channel: &dyn EngineChannel,
) -> Result<()>
where
    S: ScheduleStore + ?Sized,
{
    recalculate_with(store, sync, channel, default_id_normalize).await
}

/// Same cycle with a caller-supplied id normalization for hosts whose
/// engine echoes ids in a different textual form.
pub async fn recalculate_with<S>(
    store: &S,
    sync: &SyncService,
    channel: &dyn EngineChannel,
    normalize: impl Fn(&str) -> String,
) -> Result<()>
where
    S: ScheduleStore + ?Sized,
{
    let snapshot = store.snapshot();
    let Some(project_id) = snapshot.project_id.clone() else {
        return Ok(());
    };

    if store.take_dirty() {
        if let Err(err) = sync.push_project(&snapshot).await {
            store.mark_dirty();
            return Err(err).context("pushing snapshot before recalculation");
        }
    }

    let response = channel
        .invoke("project.recalculate", vec![json!(project_id)])
        .await
        .context("requesting recalculation")?;

    let task_list = response.get("tasks").cloned().ok_or_else(|| {
        EngineError::InvalidResponse("recalculation response carries no task list".to_string())
    })?;
    let engine_tasks: Vec<EngineTask> = serde_json::from_value(task_list)
        .map_err(|err| EngineError::InvalidResponse(format!("malformed task list: {err}")))?;

    // merge over the tasks as they are *now*, not as they were snapshotted;
    // the user may have edited while the engine was computing
    let merged = apply_cpm_results(&store.tasks(), &engine_tasks, normalize);
    store.replace_tasks(refresh_hierarchy(&merged));
    Ok(())
}
