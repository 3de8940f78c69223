//! The plaintext payload the core encrypts/decrypts and delivers, but does
//! not interpret (§1: "all user-facing messaging semantics... are
//! pass-through payloads to the core").

use serde::{Deserialize, Serialize};

/// Fan-out target for an outbound [`CryptoMessage`] (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recipient {
    /// Fan out to all of my other devices.
    PersonalMessage,
    /// Fan out to all of `name`'s devices plus all of my other devices.
    Nickname(String),
    /// Fan out to a channel's current membership.
    Channel(String),
    /// Reserved; a no-op in this core.
    Broadcast,
}

/// Message-type tag; opaque to the core beyond routing in Event
/// Orchestration (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageType(pub String);

/// Flags that steer persistence behavior on both the outbound and inbound
/// paths (§4.8). Any flag in this set means the message is a "nudge" —
/// ephemeral control that is never given a local `EncryptedMessage` row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageFlags {
    pub communication_synchronization: bool,
    pub friendship_state_request: bool,
    pub delivery_state_change: bool,
    pub edit_message: bool,
    pub contact_created: bool,
}

impl MessageFlags {
    /// True if any flag marks this message as a nudge: the outbound side
    /// must not persist a local copy for it.
    pub fn is_nudge(&self) -> bool {
        self.communication_synchronization
            || self.friendship_state_request
            || self.delivery_state_change
            || self.edit_message
            || self.contact_created
    }
}

/// The application-supplied plaintext unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoMessage {
    pub message_type: MessageType,
    pub flags: MessageFlags,
    /// Opaque application payload; the core never parses this.
    pub payload: serde_json::Value,
}
