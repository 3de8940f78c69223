//! The transport collaborator (§6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::keys::{KemPublicKey, X25519PublicKey};
use crate::crypto_message::{MessageFlags, MessageType, Recipient};
use crate::error::CoreResult;
use crate::identity::bundle::{Signed, SignedOneTimeKey, UserConfiguration};
use crate::identity::device_config::UserDeviceConfiguration;
use crate::session::ratchet::message::SignedRatchetMessage;

/// Which one-time key inventory an operation concerns — reconciliation,
/// refill, and wipe are all per-flavor (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OneTimeKeyFlavor {
    Curve,
    Kyber,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PushType {
    #[default]
    Alert,
    Silent,
}

/// The result of a `findConfiguration` lookup, reshaping the source's
/// exception-for-control-flow (`userExists` thrown to branch registration,
/// §9) into an explicit variant the registration path consumes.
#[derive(Debug, Clone)]
pub enum ConfigurationLookup {
    Exists(UserConfiguration),
    Absent,
}

/// What `sendMessage` needs beyond the signed ciphertext itself.
#[derive(Debug, Clone)]
pub struct SendEnvelope {
    pub secret_name: String,
    pub device_id: Uuid,
    pub push_type: PushType,
    pub shared_message_identifier: String,
    pub message_type: MessageType,
    pub message_flags: MessageFlags,
    pub recipient: Recipient,
}

/// One-time publics returned for session establishment against a specific
/// device; either may be absent (§4.3 fallback path).
#[derive(Debug, Clone, Default)]
pub struct OneTimeKeyBundle {
    pub curve: Option<SignedOneTimeKey<X25519PublicKey>>,
    pub kyber: Option<SignedOneTimeKey<KemPublicKey>>,
}

/// Which one-time keys a newly materialized [`crate::session::identity::SessionIdentity`]
/// consumed, so the transport can mark them used server-side.
#[derive(Debug, Clone, Default)]
pub struct ConsumedOneTimeKeys {
    pub curve_id: Option<Uuid>,
    pub kyber_id: Option<Uuid>,
}

/// Network I/O boundary the core consumes but never implements (§6). All
/// methods are suspension points (§5) — the core imposes no timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        message: SignedRatchetMessage,
        envelope: SendEnvelope,
    ) -> CoreResult<()>;

    async fn find_configuration(&self, secret_name: &str) -> CoreResult<ConfigurationLookup>;

    async fn publish_user_configuration(
        &self,
        configuration: UserConfiguration,
        recipient_device_id: Uuid,
    ) -> CoreResult<()>;

    async fn fetch_one_time_keys(
        &self,
        secret_name: &str,
        device_id: Uuid,
    ) -> CoreResult<OneTimeKeyBundle>;

    async fn fetch_one_time_key_identities(
        &self,
        secret_name: &str,
        device_id: Uuid,
        flavor: OneTimeKeyFlavor,
    ) -> CoreResult<Vec<Uuid>>;

    async fn update_one_time_keys(
        &self,
        secret_name: &str,
        device_id: Uuid,
        keys: Vec<SignedOneTimeKey<X25519PublicKey>>,
    ) -> CoreResult<()>;

    async fn update_one_time_pq_kem_keys(
        &self,
        secret_name: &str,
        device_id: Uuid,
        keys: Vec<SignedOneTimeKey<KemPublicKey>>,
    ) -> CoreResult<()>;

    async fn batch_delete_one_time_keys(
        &self,
        secret_name: &str,
        device_id: Uuid,
        flavor: OneTimeKeyFlavor,
    ) -> CoreResult<()>;

    async fn rotate_long_term_keys(
        &self,
        secret_name: &str,
        device_id: Uuid,
        signed_device: Signed<UserDeviceConfiguration>,
    ) -> CoreResult<()>;

    async fn notify_identity_creation(
        &self,
        secret_name: &str,
        device_id: Uuid,
        consumed: ConsumedOneTimeKeys,
    ) -> CoreResult<()>;
}
