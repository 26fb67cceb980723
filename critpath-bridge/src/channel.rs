//! Command channel to the external scheduling engine.
//!
//! The engine is a black box reached through a generic
//! `command name, positional arguments -> response` invocation channel.
//! The bridge never sees the engine's internals; everything it knows
//! arrives through this trait.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure modes when talking to the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The command never produced a usable response: process gone,
    /// channel closed, I/O failure.
    #[error("engine transport failure: {0}")]
    Transport(String),
    /// The engine answered, but the payload does not match the contract.
    #[error("invalid engine response: {0}")]
    InvalidResponse(String),
}

/// Asynchronous command/response channel to the engine process.
///
/// Implementations are transport-specific (pipe, socket, in-process stub);
/// the bridge only needs `Send + Sync` object safety so one channel can be
/// shared by the sync service and the trigger.
#[async_trait]
pub trait EngineChannel: Send + Sync {
    async fn invoke(&self, command: &str, args: Vec<Value>) -> Result<Value, EngineError>;
}
