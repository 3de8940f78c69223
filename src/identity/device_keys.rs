//! `DeviceKeys` — the device's private material (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::keys::{Ed25519SecretKey, KemSecretKey, X25519SecretKey};

#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct OneTimeX25519Entry {
    #[zeroize(skip)]
    pub id: Uuid,
    pub secret: X25519SecretKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct OneTimeKemEntry {
    #[zeroize(skip)]
    pub id: Uuid,
    pub secret: KemSecretKey,
}

/// The device's private key material. Never leaves the device; only the
/// corresponding [`crate::identity::device_config::UserDeviceConfiguration`]
/// (public) and [`crate::identity::bundle::UserConfiguration`] entries are
/// published.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct DeviceKeys {
    pub signing_private_key: Ed25519SecretKey,
    pub long_term_private_key: X25519SecretKey,
    pub one_time_private_keys: Vec<OneTimeX25519Entry>,
    pub pq_kem_one_time_private_keys: Vec<OneTimeKemEntry>,
    pub final_pq_kem_private_key: KemSecretKey,
    #[zeroize(skip)]
    pub rotate_keys_date: DateTime<Utc>,
}

impl DeviceKeys {
    pub fn take_one_time_x25519(&mut self, id: Uuid) -> Option<X25519SecretKey> {
        let idx = self.one_time_private_keys.iter().position(|e| e.id == id)?;
        let entry = self.one_time_private_keys.remove(idx);
        Some(entry.secret.clone())
    }

    pub fn take_one_time_kem(&mut self, id: Uuid) -> Option<KemSecretKey> {
        let idx = self
            .pq_kem_one_time_private_keys
            .iter()
            .position(|e| e.id == id)?;
        let entry = self.pq_kem_one_time_private_keys.remove(idx);
        Some(entry.secret.clone())
    }
}
