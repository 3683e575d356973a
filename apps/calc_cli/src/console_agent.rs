//! Agent runtime that relays outbound confirmations to stdout.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use calculator_core::{AgentConnector, AgentRuntime, SnapshotSource};
use serde_json::{json, Value};
use shared::protocol::{AssistantReply, AssistantSendData};
use tokio::sync::oneshot;
use tracing::debug;

pub struct ConsoleAgentRuntime {
    snapshot: SnapshotSource,
}

impl AgentRuntime for ConsoleAgentRuntime {
    fn send_data(
        &self,
        data: AssistantSendData,
    ) -> Result<Option<oneshot::Receiver<AssistantReply>>> {
        println!("agent <- [{}] {}", data.action_id(), data.text());
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = reply_tx.send(AssistantReply {
            kind: "console_ack".to_string(),
            payload: json!({ "action_id": data.action_id() }),
        });
        Ok(Some(reply_rx))
    }

    fn initial_data(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.snapshot.snapshot())?)
    }
}

pub struct ConsoleAgentConnector;

#[async_trait]
impl AgentConnector for ConsoleAgentConnector {
    async fn connect(&self, snapshot: SnapshotSource) -> Result<Arc<dyn AgentRuntime>> {
        debug!(state = ?snapshot.snapshot(), "agent: console runtime connected");
        let runtime: Arc<dyn AgentRuntime> = Arc::new(ConsoleAgentRuntime { snapshot });
        Ok(runtime)
    }
}
