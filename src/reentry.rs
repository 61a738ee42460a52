//! Command re-entry: redelivered commands are posted back into the same
//! ingestion pipeline that serves live messages, tagged so downstream
//! handling knows a bot scheduled them rather than a human typing them.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::scheduling::{CommandDelivery, TargetId};

pub const DELAYED_COMMAND_MARKER: &str = "[DELAYED_COMMAND] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    Human,
    ScheduledRedelivery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub kind: InboundKind,
    pub text: String,
    pub target: TargetId,
}

impl InboundCommand {
    /// The marker is stripped exactly once; the remainder is processed the
    /// same way as a live human command, so a redelivered command cannot
    /// loop unless it is explicitly scheduled again.
    pub fn classify(raw: &str, target: TargetId) -> Self {
        match raw.strip_prefix(DELAYED_COMMAND_MARKER) {
            Some(rest) => Self {
                kind: InboundKind::ScheduledRedelivery,
                text: rest.to_string(),
                target,
            },
            None => Self {
                kind: InboundKind::Human,
                text: raw.to_string(),
                target,
            },
        }
    }
}

pub fn mark_delayed(command: &str) -> String {
    format!("{DELAYED_COMMAND_MARKER}{command}")
}

/// Delivery hook that feeds fired commands back into the ingestion pipeline.
#[derive(Clone)]
pub struct CommandReentry {
    ingestion: mpsc::Sender<InboundCommand>,
}

impl CommandReentry {
    pub fn new(ingestion: mpsc::Sender<InboundCommand>) -> Self {
        Self { ingestion }
    }
}

#[async_trait]
impl CommandDelivery for CommandReentry {
    async fn deliver_command(&self, command: &str, target: TargetId) -> anyhow::Result<()> {
        let inbound = InboundCommand::classify(command, target);
        self.ingestion.send(inbound).await?;
        Ok(())
    }
}
