//! Entity rows for the cache layer (§3), beyond `SessionContext` and
//! `SessionIdentity` which get their own modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryState {
    Sending,
    Sent,
    Received,
    Delivered,
    Read,
    Failed,
}

/// Plaintext (under `K_db`) props of an [`EncryptedMessage`] row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageProps {
    pub message: crate::crypto_message::CryptoMessage,
    pub sender_secret_name: String,
    pub sender_device_id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub delivery_state: DeliveryState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub id: Uuid,
    pub communication_id: Uuid,
    pub session_context_id: i64,
    pub shared_id: String,
    pub sequence_number: i64,
    pub props: MessageProps,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommunicationType {
    PersonalMessage,
    Nickname(String),
    Channel(String),
    Broadcast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationProps {
    pub message_count: i64,
    pub members: HashSet<String>,
    pub metadata: serde_json::Value,
    pub blocked_members: HashSet<String>,
    pub communication_type: CommunicationType,
    pub shared_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCommunication {
    pub id: Uuid,
    pub props: CommunicationProps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactProps {
    pub secret_name: String,
    pub configuration: crate::identity::bundle::UserConfiguration,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactModel {
    pub id: Uuid,
    pub props: ContactProps,
}

/// An opaque ciphertext-plus-metadata record for large out-of-band
/// attachments; only lifecycle (create/fetch/delete) is in scope (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPacket {
    pub id: Uuid,
    pub ciphertext: Vec<u8>,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaJob {
    pub id: Uuid,
    pub data_packet_id: Uuid,
    pub created_at: DateTime<Utc>,
}
