//! Serialized snapshot pushes to the engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::sync::Mutex;

use critpath_core::snapshot::ProjectSnapshot;

use crate::channel::EngineChannel;
use crate::wire::{self, EngineConfig};

/// Pushes state to the engine one call at a time, in submission order.
///
/// The fair tokio mutex is held across the awaited engine call: racing
/// callers queue FIFO behind it, so no two pushes are ever in flight at
/// once and snapshots land in the order they were submitted. The guard
/// drops on every exit path, so a failed push never blocks later ones.
pub struct SyncService {
    channel: Arc<dyn EngineChannel>,
    serial: Mutex<()>,
}

impl SyncService {
    pub fn new(channel: Arc<dyn EngineChannel>) -> Self {
        Self {
            channel,
            serial: Mutex::new(()),
        }
    }

    /// Pushes a full project snapshot via `project.update`.
    ///
    /// A snapshot with no open project resolves immediately without
    /// touching the engine. Nothing local is mutated either way.
    pub async fn push_project(&self, snapshot: &ProjectSnapshot) -> Result<()> {
        let Some(project_id) = &snapshot.project_id else {
            return Ok(());
        };
        let body = wire::project_update_body(snapshot).context("serializing project snapshot")?;

        let _serial = self.serial.lock().await;
        self.channel
            .invoke("project.update", vec![json!(project_id), body])
            .await
            .context("pushing project snapshot")?;
        Ok(())
    }

    /// Pushes the engine-facing preference projection via `config.update`.
    ///
    /// Shares the serialization lock so config pushes cannot interleave
    /// with snapshot pushes.
    pub async fn push_config(&self, config: &EngineConfig) -> Result<()> {
        let body = serde_json::to_value(config).context("serializing engine config")?;

        let _serial = self.serial.lock().await;
        self.channel
            .invoke("config.update", vec![body])
            .await
            .context("pushing engine config")?;
        Ok(())
    }
}
