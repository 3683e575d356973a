//! Adapter boundary to the external conversational runtime.
//!
//! The core only ever talks to the runtime through [`AgentBridge`], which
//! swallows and logs every failure, panics included, so a broken or missing
//! agent never affects form state or calculation.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use shared::protocol::{AssistantAppState, AssistantReply, AssistantSendData};
use thiserror::Error;
use tokio::{runtime::Handle, sync::oneshot};
use tracing::{debug, info, warn};

use crate::CalculatorCore;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent runtime is unavailable")]
    Unavailable,
    #[error("agent runtime initialization panicked")]
    InitPanicked,
    #[error("agent runtime initialization was cancelled")]
    InitCancelled,
}

/// Outbound half of a connected agent runtime.
pub trait AgentRuntime: Send + Sync {
    /// Enqueues `data` for delivery without waiting for it. The optional
    /// receiver resolves with the runtime's delivery reply.
    fn send_data(&self, data: AssistantSendData) -> Result<Option<oneshot::Receiver<AssistantReply>>>;

    fn initial_data(&self) -> Result<Value> {
        Ok(Value::Null)
    }
}

#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self, snapshot: SnapshotSource) -> Result<Arc<dyn AgentRuntime>>;
}

pub struct MissingAgentConnector;

#[async_trait]
impl AgentConnector for MissingAgentConnector {
    async fn connect(&self, _snapshot: SnapshotSource) -> Result<Arc<dyn AgentRuntime>> {
        Err(AgentError::Unavailable.into())
    }
}

/// Synchronous state accessor handed to the runtime at connect time.
#[derive(Clone)]
pub struct SnapshotSource {
    core: Weak<CalculatorCore>,
}

impl SnapshotSource {
    pub(crate) fn new(core: &Arc<CalculatorCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
        }
    }

    pub fn snapshot(&self) -> AssistantAppState {
        match self.core.upgrade() {
            Some(core) => core.snapshot(),
            None => AssistantAppState::default(),
        }
    }
}

#[derive(Clone)]
pub struct AgentBridge {
    runtime: Arc<dyn AgentRuntime>,
}

impl AgentBridge {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { runtime }
    }

    /// Delivers `value` under `action_id`. Errors and panics raised by the
    /// runtime are logged here and never reach the caller.
    pub fn send(&self, action_id: &str, value: &str) {
        let data = AssistantSendData::value(action_id, value);
        let sent = panic::catch_unwind(AssertUnwindSafe(|| self.runtime.send_data(data)));
        match sent {
            Ok(Ok(Some(reply_rx))) => log_reply(action_id, reply_rx),
            Ok(Ok(None)) => debug!(action_id, "agent: data sent"),
            Ok(Err(err)) => warn!(action_id, "agent: error sending action: {err:#}"),
            Err(_) => warn!(action_id, "agent: runtime panicked while sending action"),
        }
    }

    pub fn log_initial_data(&self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.runtime.initial_data())) {
            Ok(Ok(data)) => info!(initial_data = %data, "agent: initial data"),
            Ok(Err(err)) => warn!("agent: could not get initial data: {err:#}"),
            Err(_) => warn!("agent: runtime panicked while reading initial data"),
        }
    }
}

fn log_reply(action_id: &str, reply_rx: oneshot::Receiver<AssistantReply>) {
    let Ok(runtime) = Handle::try_current() else {
        debug!(action_id, "agent: no async runtime, reply will not be logged");
        return;
    };
    let action_id = action_id.to_string();
    runtime.spawn(async move {
        match reply_rx.await {
            Ok(reply) => debug!(
                action_id = %action_id,
                reply_type = %reply.kind,
                payload = %reply.payload,
                "agent: sendData reply"
            ),
            Err(_) => debug!(action_id = %action_id, "agent: reply channel closed"),
        }
    });
}

/// Runs the connector in its own task so a panicking runtime is contained.
pub(crate) async fn connect_isolated(
    connector: Arc<dyn AgentConnector>,
    snapshot: SnapshotSource,
) -> Result<Arc<dyn AgentRuntime>> {
    match tokio::spawn(async move { connector.connect(snapshot).await }).await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => Err(AgentError::InitPanicked.into()),
        Err(_) => Err(AgentError::InitCancelled.into()),
    }
}
