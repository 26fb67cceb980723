//! Debounced, single-flight recomputation triggering.
//!
//! The trigger watches the stream of preference-change events, coalesces
//! bursts into one action, and drives at most one recompute cycle at a
//! time. It is a background path: engine trouble degrades to a local
//! estimate and a log line, never to an error in the editing layer.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use critpath_core::dependency::refresh_hierarchy;
use critpath_core::reconcile::local_cpm_estimate;

use crate::channel::{EngineChannel, EngineError};
use crate::recalc::recalculate_critical_path;
use crate::store::ScheduleStore;
use crate::sync::SyncService;

/// Preference categories carried by change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefCategory {
    Calendars,
    Scheduling,
    CriticalSlack,
    Display,
    Storage,
}

impl PrefCategory {
    /// Whether a change in this category can move computed dates.
    pub fn affects_schedule(self) -> bool {
        matches!(self, Self::Calendars | Self::Scheduling | Self::CriticalSlack)
    }
}

/// One preference-change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefChange {
    pub category: PrefCategory,
    pub key: String,
}

impl PrefChange {
    pub fn new(category: PrefCategory, key: impl Into<String>) -> Self {
        Self {
            category,
            key: key.into(),
        }
    }
}

/// Keys that mark wholesale replacement (bulk load, import, reset). The
/// loader handles those; they never trigger incremental recomputation.
const BOOKKEEPING_KEYS: [&str; 3] = ["loaded", "imported", "reset"];

/// Debounce + single-flight state machine in front of the recompute cycle.
///
/// One instance per running application, constructed with its
/// collaborators injected; there is no global state.
pub struct RecalcTrigger<S: ScheduleStore> {
    inner: Arc<TriggerInner<S>>,
    timer: StdMutex<Option<JoinHandle<()>>>,
}

struct TriggerInner<S> {
    sync: Arc<SyncService>,
    store: Arc<S>,
    channel: Arc<dyn EngineChannel>,
    debounce: Duration,
    /// True while a recompute cycle is in flight; extra triggers are
    /// dropped, not queued.
    recalculating: AtomicBool,
    /// Set when any event in the current burst affects the schedule.
    pending_recalc: AtomicBool,
}

impl<S: ScheduleStore + 'static> RecalcTrigger<S> {
    pub fn new(
        sync: Arc<SyncService>,
        store: Arc<S>,
        channel: Arc<dyn EngineChannel>,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(TriggerInner {
                sync,
                store,
                channel,
                debounce,
                recalculating: AtomicBool::new(false),
                pending_recalc: AtomicBool::new(false),
            }),
            timer: StdMutex::new(None),
        }
    }

    /// Feeds one preference-change event into the debouncer.
    ///
    /// Every non-bookkeeping event restarts the timer, so a burst of rapid
    /// changes collapses into a single firing. Must be called from within
    /// a tokio runtime.
    pub fn observe(&self, change: &PrefChange) {
        if BOOKKEEPING_KEYS.contains(&change.key.as_str()) {
            return;
        }
        if change.category.affects_schedule() {
            self.inner.pending_recalc.store(true, Ordering::SeqCst);
        }

        let inner = Arc::clone(&self.inner);
        let mut timer = self.timer.lock().expect("trigger timer lock poisoned");
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.fire().await;
        }));
    }
}

impl<S: ScheduleStore> TriggerInner<S> {
    async fn fire(&self) {
        // the config projection goes out on every debounced trigger,
        // recompute or not
        if let Err(err) = self.sync.push_config(&self.store.engine_config()).await {
            tracing::warn!(error = %err, "engine config push failed");
        }

        if !self.pending_recalc.swap(false, Ordering::SeqCst) {
            return;
        }
        if self.recalculating.swap(true, Ordering::SeqCst) {
            tracing::debug!("recalculation already in flight, dropping trigger");
            return;
        }

        let result =
            recalculate_critical_path(self.store.as_ref(), &self.sync, self.channel.as_ref())
                .await;
        if let Err(err) = result {
            match err.downcast_ref::<EngineError>() {
                Some(EngineError::InvalidResponse(_)) => {
                    tracing::error!(error = %err, "engine returned an unusable recalculation payload");
                }
                _ => {
                    tracing::warn!(error = %err, "engine unreachable, applying local estimate");
                    let estimate = local_cpm_estimate(&self.store.tasks());
                    self.store.replace_tasks(refresh_hierarchy(&estimate));
                }
            }
        }
        self.recalculating.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ProjectState};
    use crate::testutil::{MockChannel, settle};
    use chrono::{DateTime, TimeZone, Utc};
    use critpath_core::task::Task;
    use serde_json::json;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 8, 0, 0).unwrap()
    }

    fn fixture(channel: &Arc<MockChannel>) -> (Arc<SyncService>, Arc<MemoryStore>) {
        let sync = Arc::new(SyncService::new(channel.clone() as Arc<dyn EngineChannel>));
        let store = Arc::new(MemoryStore::new(ProjectState {
            project_id: Some("p1".to_string()),
            tasks: vec![
                Task::new("a", "A", day(1), day(3)),
                Task::new("b", "B", day(2), day(5)).with_predecessor("a"),
            ],
            ..ProjectState::default()
        }));
        (sync, store)
    }

    fn trigger(
        channel: &Arc<MockChannel>,
        sync: Arc<SyncService>,
        store: Arc<MemoryStore>,
    ) -> RecalcTrigger<MemoryStore> {
        RecalcTrigger::new(
            sync,
            store,
            channel.clone() as Arc<dyn EngineChannel>,
            DEBOUNCE,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_schedule_changes_runs_one_cycle() {
        let channel = Arc::new(MockChannel::new());
        channel.set_response("project.recalculate", json!({"tasks": []}));
        let (sync, store) = fixture(&channel);
        let trigger = trigger(&channel, sync, store);

        for i in 0..10 {
            trigger.observe(&PrefChange::new(PrefCategory::Scheduling, format!("rule_{i}")));
        }
        settle(DEBOUNCE * 2).await;

        let commands = channel.commands();
        assert_eq!(
            commands.iter().filter(|c| *c == "project.recalculate").count(),
            1
        );
        assert_eq!(commands.iter().filter(|c| *c == "config.update").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn each_event_restarts_the_debounce_window() {
        let channel = Arc::new(MockChannel::new());
        channel.set_response("project.recalculate", json!({"tasks": []}));
        let (sync, store) = fixture(&channel);
        let trigger = trigger(&channel, sync, store);

        trigger.observe(&PrefChange::new(PrefCategory::Scheduling, "rule_a"));
        tokio::time::sleep(DEBOUNCE / 2).await;
        trigger.observe(&PrefChange::new(PrefCategory::Scheduling, "rule_b"));
        tokio::time::sleep(DEBOUNCE / 2).await;
        // the first window would have fired by now; the restart held it back
        assert!(channel.commands().is_empty());

        settle(DEBOUNCE).await;
        assert_eq!(
            channel.commands().iter().filter(|c| *c == "project.recalculate").count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bookkeeping_keys_never_trigger() {
        let channel = Arc::new(MockChannel::new());
        let (sync, store) = fixture(&channel);
        let trigger = trigger(&channel, sync, store);

        for key in ["loaded", "imported", "reset"] {
            trigger.observe(&PrefChange::new(PrefCategory::Scheduling, key));
        }
        settle(DEBOUNCE * 2).await;
        assert!(channel.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn display_changes_push_config_without_recomputing() {
        let channel = Arc::new(MockChannel::new());
        let (sync, store) = fixture(&channel);
        let trigger = trigger(&channel, sync, store);

        trigger.observe(&PrefChange::new(PrefCategory::Display, "theme"));
        settle(DEBOUNCE * 2).await;

        assert_eq!(channel.commands(), vec!["config.update".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_during_active_cycle_is_dropped() {
        let channel = Arc::new(MockChannel::new());
        channel.set_response("project.recalculate", json!({"tasks": []}));
        channel.set_delay("project.recalculate", DEBOUNCE * 4);
        let (sync, store) = fixture(&channel);
        let trigger = trigger(&channel, sync, store);

        trigger.observe(&PrefChange::new(PrefCategory::Calendars, "monday"));
        // let the first cycle start and begin awaiting the engine
        tokio::time::sleep(DEBOUNCE + DEBOUNCE / 2).await;
        trigger.observe(&PrefChange::new(PrefCategory::Calendars, "tuesday"));
        settle(DEBOUNCE * 8).await;

        assert_eq!(
            channel.commands().iter().filter(|c| *c == "project.recalculate").count(),
            1
        );
        assert_eq!(
            channel.commands().iter().filter(|c| *c == "config.update").count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn engine_failure_degrades_to_local_estimate() {
        let channel = Arc::new(MockChannel::new());
        channel.fail("project.recalculate");
        let (sync, store) = fixture(&channel);
        let trigger = trigger(&channel, sync.clone(), store.clone());

        trigger.observe(&PrefChange::new(PrefCategory::CriticalSlack, "limit"));
        settle(DEBOUNCE * 2).await;

        let tasks = store.tasks();
        let advice = tasks[1].cpm.as_ref().unwrap();
        assert_eq!(advice.early_start, day(3));
        assert!(advice.dependency_violation);
        // user dates survive the degraded path too
        assert_eq!(tasks[1].start, day(2));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_response_leaves_the_model_alone() {
        let channel = Arc::new(MockChannel::new());
        channel.set_response("project.recalculate", json!({"status": "ok"}));
        let (sync, store) = fixture(&channel);
        let trigger = trigger(&channel, sync, store.clone());

        trigger.observe(&PrefChange::new(PrefCategory::Scheduling, "rule"));
        settle(DEBOUNCE * 2).await;

        assert!(store.tasks().iter().all(|t| t.cpm.is_none()));
    }
}
