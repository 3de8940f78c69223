//! `SessionContext` — the root per-installation secret record (§3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::keys::{Ed25519SecretKey, SymmetricKey};
use crate::identity::bundle::UserConfiguration;
use crate::identity::device_keys::DeviceKeys;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub secret_name: String,
    pub device_id: Uuid,
    pub device_keys: DeviceKeys,
    /// The account's signing secret (§4.2): identical to
    /// `device_keys.signing_private_key` on the master device; on a child
    /// device it is the distinct key the master used to re-sign this
    /// device's bundle entry at linking time, handed over out of band.
    pub authorizing_secret: Ed25519SecretKey,
}

/// The root secret record, persisted only as ciphertext under `K_app`
/// (§4.6). Decrypting it yields `database_encryption_key`, which in turn
/// gates every other entity's props.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_user: SessionUser,
    pub database_encryption_key: SymmetricKey,
    pub session_context_id: i64,
    pub active_user_configuration: UserConfiguration,
    pub registration_state: RegistrationState,
}
