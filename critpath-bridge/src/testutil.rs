//! Shared test doubles for the bridge tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::channel::{EngineChannel, EngineError};

/// Recording engine stub: remembers every invocation in order, can delay
/// or fail individual commands, and notices overlapping invocations.
pub struct MockChannel {
    calls: StdMutex<Vec<(String, Vec<Value>)>>,
    responses: StdMutex<HashMap<String, Value>>,
    failures: StdMutex<HashSet<String>>,
    delays: StdMutex<HashMap<String, Duration>>,
    active: AtomicUsize,
    overlapped: AtomicBool,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            calls: StdMutex::new(Vec::new()),
            responses: StdMutex::new(HashMap::new()),
            failures: StdMutex::new(HashSet::new()),
            delays: StdMutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
        }
    }

    pub fn set_response(&self, command: &str, response: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), response);
    }

    pub fn set_delay(&self, command: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(command.to_string(), delay);
    }

    pub fn fail(&self, command: &str) {
        self.failures.lock().unwrap().insert(command.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(c, _)| c).collect()
    }

    /// True if two invocations were ever in flight at once.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineChannel for MockChannel {
    async fn invoke(&self, command: &str, args: Vec<Value>) -> Result<Value, EngineError> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), args));

        let delay = self.delays.lock().unwrap().get(command).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failures.lock().unwrap().contains(command) {
            return Err(EngineError::Transport(format!("{command}: engine unreachable")));
        }
        let response = self.responses.lock().unwrap().get(command).cloned();
        Ok(response.unwrap_or_else(|| json!({"ok": true})))
    }
}

/// Advances past `window` and lets spawned tasks run to completion.
pub async fn settle(window: Duration) {
    tokio::time::sleep(window).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
