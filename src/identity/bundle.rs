//! `UserConfiguration` — the published, signed bundle for a user (§3), plus
//! the verification contract of §4.2.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::crypto::keys::{Ed25519PublicKey, Ed25519SecretKey, KemPublicKey, Signature, X25519PublicKey};
use crate::crypto::{sign, verify};
use crate::error::{CoreError, CoreResult};

use super::device_config::UserDeviceConfiguration;

/// A value together with an Ed25519 signature over its canonical encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signed<T> {
    pub value: T,
    pub signature: Signature,
}

impl<T: Serialize> Signed<T> {
    pub fn new(value: T, secret: &Ed25519SecretKey) -> CoreResult<Self> {
        let bytes = bincode::serialize(&value)?;
        let signature = sign(secret, &bytes);
        Ok(Self { value, signature })
    }

    pub fn verify(&self, public: &Ed25519PublicKey) -> CoreResult<()> {
        let bytes = bincode::serialize(&self.value)?;
        verify(public, &bytes, &self.signature).map_err(|_| CoreError::InvalidSignature)
    }
}

/// A one-time public key signed together with the id of the device that
/// owns it, so the signature binds ownership as well as the key itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedOneTimeKey<T> {
    pub id: Uuid,
    pub device_id: Uuid,
    pub public: T,
    pub signature: Signature,
}

#[derive(Debug, Clone, Serialize)]
struct OneTimeKeySigningPayload<'a, T> {
    id: Uuid,
    device_id: Uuid,
    public: &'a T,
}

impl<T: Serialize + Clone> SignedOneTimeKey<T> {
    pub fn new(
        id: Uuid,
        device_id: Uuid,
        public: T,
        secret: &Ed25519SecretKey,
    ) -> CoreResult<Self> {
        let payload = OneTimeKeySigningPayload {
            id,
            device_id,
            public: &public,
        };
        let bytes = bincode::serialize(&payload)?;
        let signature = sign(secret, &bytes);
        Ok(Self {
            id,
            device_id,
            public,
            signature,
        })
    }

    pub fn verify(&self, signing_public: &Ed25519PublicKey) -> CoreResult<()> {
        let payload = OneTimeKeySigningPayload {
            id: self.id,
            device_id: self.device_id,
            public: &self.public,
        };
        let bytes = bincode::serialize(&payload)?;
        verify(signing_public, &bytes, &self.signature).map_err(|_| CoreError::InvalidSignature)
    }
}

/// The published bundle for a user (§3). Every signature inside verifies
/// under `signing_public_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfiguration {
    pub signing_public_key: Ed25519PublicKey,
    pub signed_devices: Vec<Signed<UserDeviceConfiguration>>,
    pub signed_one_time_public_keys: Vec<SignedOneTimeKey<X25519PublicKey>>,
    pub signed_pq_kem_one_time_public_keys: Vec<SignedOneTimeKey<KemPublicKey>>,
}

impl UserConfiguration {
    /// Enforces the verification contract of §4.2: every nested signature
    /// checks out under `signing_public_key`, one-time keys belong to a
    /// listed device, and device ids are unique.
    pub fn verify(&self) -> CoreResult<()> {
        let mut seen_devices = HashSet::new();
        for signed_device in &self.signed_devices {
            signed_device.verify(&self.signing_public_key)?;
            if !seen_devices.insert(signed_device.value.device_id) {
                return Err(CoreError::InvalidDocument(format!(
                    "duplicate deviceId {}",
                    signed_device.value.device_id
                )));
            }
        }

        for key in &self.signed_one_time_public_keys {
            key.verify(&self.signing_public_key)?;
            if !seen_devices.contains(&key.device_id) {
                return Err(CoreError::InvalidDocument(
                    "one-time key owned by unlisted device".into(),
                ));
            }
        }
        for key in &self.signed_pq_kem_one_time_public_keys {
            key.verify(&self.signing_public_key)?;
            if !seen_devices.contains(&key.device_id) {
                return Err(CoreError::InvalidDocument(
                    "one-time key owned by unlisted device".into(),
                ));
            }
        }
        Ok(())
    }

    /// Additional check used only when the bundle under inspection claims
    /// to be the caller's own: the published signing public key must match
    /// the one derived from the locally held signing private key.
    pub fn verify_is_own(&self, local_signing_public: &Ed25519PublicKey) -> CoreResult<()> {
        self.verify()?;
        if &self.signing_public_key != local_signing_public {
            return Err(CoreError::InvalidSignature);
        }
        Ok(())
    }

    pub fn device_ids(&self) -> HashSet<Uuid> {
        self.signed_devices
            .iter()
            .map(|d| d.value.device_id)
            .collect()
    }

    pub fn find_device(&self, device_id: Uuid) -> Option<&Signed<UserDeviceConfiguration>> {
        self.signed_devices
            .iter()
            .find(|d| d.value.device_id == device_id)
    }
}
