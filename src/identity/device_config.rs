//! `UserDeviceConfiguration` — a device's public handle (§3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::keys::{Ed25519PublicKey, KemPublicKey, X25519PublicKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDeviceConfiguration {
    pub device_id: Uuid,
    pub signing_public_key: Ed25519PublicKey,
    pub long_term_public_key: X25519PublicKey,
    pub final_pq_kem_public_key: KemPublicKey,
    pub device_name: Option<String>,
    pub hmac_data: [u8; 32],
    pub is_master_device: bool,
}
