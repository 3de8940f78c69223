//! `JobModel` and its task payloads (§3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaborators::transport::PushType;
use crate::crypto_message::{CryptoMessage, Recipient};
use crate::session::identity::SessionIdentity;
use crate::session::ratchet::message::SignedRatchetMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundTaskMessage {
    pub message: CryptoMessage,
    pub recipient_identity: SessionIdentity,
    pub local_id: Uuid,
    pub shared_id: String,
    #[serde(default)]
    pub push_type: PushType,
    pub recipient: Recipient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundTaskMessage {
    pub signed_message: SignedRatchetMessage,
    pub sender_secret_name: String,
    pub sender_device_id: Uuid,
    pub shared_message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskType {
    WriteMessage(OutboundTaskMessage),
    StreamMessage(InboundTaskMessage),
}

impl TaskType {
    /// The `(secretName, deviceId)` this task's ratchet mutation is scoped
    /// to — used to route the task to the single crypto-executor loop in
    /// FIFO order per §5's per-pair ordering guarantee.
    pub fn target_pair(&self) -> (&str, Uuid) {
        match self {
            TaskType::WriteMessage(task) => (
                task.recipient_identity.secret_name.as_str(),
                task.recipient_identity.device_id,
            ),
            TaskType::StreamMessage(task) => {
                (task.sender_secret_name.as_str(), task.sender_device_id)
            }
        }
    }
}

/// Plaintext (under `K_db`) props of a [`JobModel`] row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProps {
    pub sequence_id: u64,
    pub task: TaskType,
    pub is_background_task: bool,
    pub scheduled_at: DateTime<Utc>,
    pub attempts: u32,
    pub delayed_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobModel {
    pub id: Uuid,
    pub props: JobProps,
}

impl JobModel {
    pub fn new(sequence_id: u64, task: TaskType, is_background_task: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            props: JobProps {
                sequence_id,
                task,
                is_background_task,
                scheduled_at: Utc::now(),
                attempts: 0,
                delayed_until: None,
            },
        }
    }
}

impl PartialEq for JobModel {
    fn eq(&self, other: &Self) -> bool {
        self.props.sequence_id == other.props.sequence_id
    }
}
impl Eq for JobModel {}

impl PartialOrd for JobModel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for JobModel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.props.sequence_id.cmp(&other.props.sequence_id)
    }
}
