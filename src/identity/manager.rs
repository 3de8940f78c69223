//! Identity & Bundle Manager (§4.2): bundle generation, verification,
//! one-time-key refill, and long-term rotation.
//!
//! Every entry inside a [`UserConfiguration`] — device configs and
//! one-time keys alike — is signed under the account's single signing
//! key, not under each device's own. For the master device these
//! coincide; a child device's own [`crate::crypto::keys::Ed25519SecretKey`]
//! only signs its outbound ratchet traffic, never the bundle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::collaborators::transport::{OneTimeKeyFlavor, Transport};
use crate::config::CoreConfig;
use crate::crypto::keys::Ed25519SecretKey;
use crate::crypto::{generate_ed25519_keypair, generate_kem_keypair, generate_x25519_keypair};
use crate::error::{CoreError, CoreResult};

use super::bundle::{Signed, SignedOneTimeKey, UserConfiguration};
use super::device_config::UserDeviceConfiguration;
use super::device_keys::{DeviceKeys, OneTimeKemEntry, OneTimeX25519Entry};

const ONE_TIME_KEY_BATCH: usize = 100;

pub struct IdentityManager {
    transport: Arc<dyn Transport>,
    config: CoreConfig,
}

/// A freshly provisioned device: private material plus the signed public
/// bundle ready to publish.
pub struct CryptographicBundle {
    pub device_keys: DeviceKeys,
    pub configuration: UserConfiguration,
}

struct RawDevice {
    device_keys: DeviceKeys,
    device_config: UserDeviceConfiguration,
    one_time_curve: Vec<(Uuid, crate::crypto::keys::X25519PublicKey)>,
    one_time_kem: Vec<(Uuid, crate::crypto::keys::KemPublicKey)>,
}

impl IdentityManager {
    pub fn new(transport: Arc<dyn Transport>, config: CoreConfig) -> Self {
        Self { transport, config }
    }

    /// Produces a fresh bundle for a new (master) device, §4.2 "Bundle
    /// generation" steps 1-8.
    pub fn generate_bundle(&self) -> CoreResult<CryptographicBundle> {
        let signing = generate_ed25519_keypair();
        let raw = self.generate_raw_device(true);
        let device_id = raw.device_config.device_id;

        let signed_device = Signed::new(raw.device_config, &signing.secret)?;
        let mut signed_one_time_public_keys = Vec::with_capacity(raw.one_time_curve.len());
        for (id, public) in raw.one_time_curve {
            signed_one_time_public_keys.push(SignedOneTimeKey::new(id, device_id, public, &signing.secret)?);
        }
        let mut signed_pq_kem_one_time_public_keys = Vec::with_capacity(raw.one_time_kem.len());
        for (id, public) in raw.one_time_kem {
            signed_pq_kem_one_time_public_keys.push(SignedOneTimeKey::new(id, device_id, public, &signing.secret)?);
        }

        let mut device_keys = raw.device_keys;
        device_keys.signing_private_key = signing.secret;

        Ok(CryptographicBundle {
            device_keys,
            configuration: UserConfiguration {
                signing_public_key: signing.public,
                signed_devices: vec![signed_device],
                signed_one_time_public_keys,
                signed_pq_kem_one_time_public_keys,
            },
        })
    }

    /// Extends an existing user's bundle with an additional child device,
    /// signed under the *master* device's signing key so the new entry
    /// verifies as part of the same `UserConfiguration`.
    pub fn generate_child_device(
        &self,
        master_signing_secret: &Ed25519SecretKey,
        existing: &mut UserConfiguration,
    ) -> CoreResult<DeviceKeys> {
        let raw = self.generate_raw_device(false);
        let device_id = raw.device_config.device_id;

        let signed_device = Signed::new(raw.device_config, master_signing_secret)?;
        let mut signed_curve = Vec::with_capacity(raw.one_time_curve.len());
        for (id, public) in raw.one_time_curve {
            signed_curve.push(SignedOneTimeKey::new(id, device_id, public, master_signing_secret)?);
        }
        let mut signed_kem = Vec::with_capacity(raw.one_time_kem.len());
        for (id, public) in raw.one_time_kem {
            signed_kem.push(SignedOneTimeKey::new(id, device_id, public, master_signing_secret)?);
        }

        existing.signed_devices.push(signed_device);
        existing.signed_one_time_public_keys.extend(signed_curve);
        existing
            .signed_pq_kem_one_time_public_keys
            .extend(signed_kem);

        Ok(raw.device_keys)
    }

    fn generate_raw_device(&self, is_master_device: bool) -> RawDevice {
        let device_signing = generate_ed25519_keypair();
        let long_term = generate_x25519_keypair();
        let reserve_kem = generate_kem_keypair();

        let mut hmac_data = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut hmac_data);

        let device_id = Uuid::new_v4();

        let mut device_keys = DeviceKeys {
            signing_private_key: device_signing.secret,
            long_term_private_key: long_term.secret,
            one_time_private_keys: Vec::with_capacity(ONE_TIME_KEY_BATCH),
            pq_kem_one_time_private_keys: Vec::with_capacity(ONE_TIME_KEY_BATCH),
            final_pq_kem_private_key: reserve_kem.secret,
            rotate_keys_date: Utc::now() + self.config.rotation_interval,
        };

        let mut one_time_curve = Vec::with_capacity(ONE_TIME_KEY_BATCH);
        for _ in 0..ONE_TIME_KEY_BATCH {
            let kp = generate_x25519_keypair();
            let id = Uuid::new_v4();
            device_keys
                .one_time_private_keys
                .push(OneTimeX25519Entry { id, secret: kp.secret });
            one_time_curve.push((id, kp.public));
        }

        let mut one_time_kem = Vec::with_capacity(ONE_TIME_KEY_BATCH);
        for _ in 0..ONE_TIME_KEY_BATCH {
            let kp = generate_kem_keypair();
            let id = Uuid::new_v4();
            device_keys
                .pq_kem_one_time_private_keys
                .push(OneTimeKemEntry { id, secret: kp.secret });
            one_time_kem.push((id, kp.public));
        }

        let device_config = UserDeviceConfiguration {
            device_id,
            signing_public_key: device_signing.public,
            long_term_public_key: long_term.public,
            final_pq_kem_public_key: reserve_kem.public,
            device_name: None,
            hmac_data,
            is_master_device,
        };

        RawDevice {
            device_keys,
            device_config,
            one_time_curve,
            one_time_kem,
        }
    }

    /// Reconciles the curve (X25519) one-time key inventory with the
    /// transport's view, per §4.2 "One-time-key refill".
    pub async fn refill_curve_one_time_keys(
        &self,
        secret_name: &str,
        device_id: Uuid,
        device_keys: &mut DeviceKeys,
        configuration: &mut UserConfiguration,
        authorizing_secret: &Ed25519SecretKey,
    ) -> CoreResult<()> {
        let remote: HashSet<Uuid> = self
            .transport
            .fetch_one_time_key_identities(secret_name, device_id, OneTimeKeyFlavor::Curve)
            .await?
            .into_iter()
            .collect();

        device_keys
            .one_time_private_keys
            .retain(|e| remote.contains(&e.id));
        configuration
            .signed_one_time_public_keys
            .retain(|k| k.device_id != device_id || remote.contains(&k.id));

        let published_for_device = configuration
            .signed_one_time_public_keys
            .iter()
            .filter(|k| k.device_id == device_id)
            .count();

        if published_for_device <= self.config.one_time_key_low_watermark {
            let to_generate = self.config.one_time_key_target - published_for_device;
            let mut fresh = Vec::with_capacity(to_generate);
            for _ in 0..to_generate {
                let kp = generate_x25519_keypair();
                let id = Uuid::new_v4();
                device_keys
                    .one_time_private_keys
                    .push(OneTimeX25519Entry { id, secret: kp.secret });
                fresh.push(SignedOneTimeKey::new(id, device_id, kp.public, authorizing_secret)?);
            }
            self.transport
                .update_one_time_keys(secret_name, device_id, fresh.clone())
                .await
                .map_err(|e| CoreError::OneTimeKeyUploadFailed(e.to_string()))?;
            configuration.signed_one_time_public_keys.extend(fresh);
        }

        let priv_empty = device_keys.one_time_private_keys.is_empty();
        let pub_empty = !configuration
            .signed_one_time_public_keys
            .iter()
            .any(|k| k.device_id == device_id);
        if priv_empty || pub_empty {
            self.transport
                .batch_delete_one_time_keys(secret_name, device_id, OneTimeKeyFlavor::Curve)
                .await?;
        }
        Ok(())
    }

    /// Mirror of [`Self::refill_curve_one_time_keys`] for the ML-KEM
    /// flavor.
    pub async fn refill_kyber_one_time_keys(
        &self,
        secret_name: &str,
        device_id: Uuid,
        device_keys: &mut DeviceKeys,
        configuration: &mut UserConfiguration,
        authorizing_secret: &Ed25519SecretKey,
    ) -> CoreResult<()> {
        let remote: HashSet<Uuid> = self
            .transport
            .fetch_one_time_key_identities(secret_name, device_id, OneTimeKeyFlavor::Kyber)
            .await?
            .into_iter()
            .collect();

        device_keys
            .pq_kem_one_time_private_keys
            .retain(|e| remote.contains(&e.id));
        configuration
            .signed_pq_kem_one_time_public_keys
            .retain(|k| k.device_id != device_id || remote.contains(&k.id));

        let published_for_device = configuration
            .signed_pq_kem_one_time_public_keys
            .iter()
            .filter(|k| k.device_id == device_id)
            .count();

        if published_for_device <= self.config.one_time_key_low_watermark {
            let to_generate = self.config.one_time_key_target - published_for_device;
            let mut fresh = Vec::with_capacity(to_generate);
            for _ in 0..to_generate {
                let kp = generate_kem_keypair();
                let id = Uuid::new_v4();
                device_keys
                    .pq_kem_one_time_private_keys
                    .push(OneTimeKemEntry { id, secret: kp.secret });
                fresh.push(SignedOneTimeKey::new(id, device_id, kp.public, authorizing_secret)?);
            }
            self.transport
                .update_one_time_pq_kem_keys(secret_name, device_id, fresh.clone())
                .await
                .map_err(|e| CoreError::OneTimeKeyUploadFailed(e.to_string()))?;
            configuration
                .signed_pq_kem_one_time_public_keys
                .extend(fresh);
        }

        let priv_empty = device_keys.pq_kem_one_time_private_keys.is_empty();
        let pub_empty = !configuration
            .signed_pq_kem_one_time_public_keys
            .iter()
            .any(|k| k.device_id == device_id);
        if priv_empty || pub_empty {
            self.transport
                .batch_delete_one_time_keys(secret_name, device_id, OneTimeKeyFlavor::Kyber)
                .await?;
        }
        Ok(())
    }

    /// Scheduled rotation (§4.2): rotates the reserve ML-KEM key once
    /// `rotate_keys_date` has passed, a no-op otherwise.
    pub async fn rotate_scheduled(
        &self,
        secret_name: &str,
        device_id: Uuid,
        device_keys: &mut DeviceKeys,
        configuration: &mut UserConfiguration,
        authorizing_secret: &Ed25519SecretKey,
    ) -> CoreResult<()> {
        if Utc::now() < device_keys.rotate_keys_date {
            return Ok(());
        }

        let fresh_kem = generate_kem_keypair();
        device_keys.final_pq_kem_private_key = fresh_kem.secret;
        device_keys.rotate_keys_date = Utc::now() + self.config.rotation_interval;

        let existing = configuration
            .find_device(device_id)
            .ok_or(CoreError::InvalidDeviceIdentity)?
            .clone();
        existing.verify(&configuration.signing_public_key)?;

        let mut updated = existing.value;
        updated.final_pq_kem_public_key = fresh_kem.public;
        let resigned = Signed::new(updated, authorizing_secret)?;
        replace_device_entry(configuration, device_id, resigned.clone());

        self.transport
            .rotate_long_term_keys(secret_name, device_id, resigned)
            .await
            .map_err(|e| CoreError::LongTermKeyRotationFailed(e.to_string()))?;
        Ok(())
    }

    /// Compromise rotation (§4.2): fresh per-device signing, long-term
    /// X25519, and reserve ML-KEM keys. The resigned entry is signed with
    /// `authorizing_secret`, the account's signing key — unchanged by a
    /// per-device rotation. Caller sets/clears the `rotatingKeys` flag
    /// around this call (§5).
    pub async fn rotate_on_compromise(
        &self,
        secret_name: &str,
        device_id: Uuid,
        device_keys: &mut DeviceKeys,
        configuration: &mut UserConfiguration,
        authorizing_secret: &Ed25519SecretKey,
    ) -> CoreResult<()> {
        let existing = configuration
            .find_device(device_id)
            .ok_or(CoreError::InvalidDeviceIdentity)?
            .clone();
        existing.verify(&configuration.signing_public_key)?;

        let new_signing = generate_ed25519_keypair();
        let new_long_term = generate_x25519_keypair();
        let new_reserve_kem = generate_kem_keypair();

        let mut updated = existing.value;
        updated.signing_public_key = new_signing.public;
        updated.long_term_public_key = new_long_term.public;
        updated.final_pq_kem_public_key = new_reserve_kem.public;
        let resigned = Signed::new(updated, authorizing_secret)?;

        replace_device_entry(configuration, device_id, resigned.clone());

        device_keys.signing_private_key = new_signing.secret;
        device_keys.long_term_private_key = new_long_term.secret;
        device_keys.final_pq_kem_private_key = new_reserve_kem.secret;

        self.transport
            .rotate_long_term_keys(secret_name, device_id, resigned)
            .await
            .map_err(|e| CoreError::LongTermKeyRotationFailed(e.to_string()))?;
        Ok(())
    }
}

fn replace_device_entry(
    configuration: &mut UserConfiguration,
    device_id: Uuid,
    resigned: Signed<UserDeviceConfiguration>,
) {
    if let Some(slot) = configuration
        .signed_devices
        .iter_mut()
        .find(|d| d.value.device_id == device_id)
    {
        *slot = resigned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::transport::{ConfigurationLookup, ConsumedOneTimeKeys, OneTimeKeyBundle, SendEnvelope};
    use crate::crypto::keys::KemPublicKey;
    use crate::session::ratchet::message::SignedRatchetMessage;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct StubTransport {
        remote_curve_ids: StdMutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send_message(&self, _message: SignedRatchetMessage, _envelope: SendEnvelope) -> CoreResult<()> {
            Ok(())
        }
        async fn find_configuration(&self, _secret_name: &str) -> CoreResult<ConfigurationLookup> {
            Ok(ConfigurationLookup::Absent)
        }
        async fn publish_user_configuration(&self, _configuration: UserConfiguration, _recipient_device_id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_one_time_keys(&self, _secret_name: &str, _device_id: Uuid) -> CoreResult<OneTimeKeyBundle> {
            Ok(OneTimeKeyBundle::default())
        }
        async fn fetch_one_time_key_identities(&self, _secret_name: &str, _device_id: Uuid, flavor: OneTimeKeyFlavor) -> CoreResult<Vec<Uuid>> {
            match flavor {
                OneTimeKeyFlavor::Curve => Ok(self.remote_curve_ids.lock().unwrap().clone()),
                OneTimeKeyFlavor::Kyber => Ok(Vec::new()),
            }
        }
        async fn update_one_time_keys(&self, _secret_name: &str, _device_id: Uuid, _keys: Vec<SignedOneTimeKey<crate::crypto::keys::X25519PublicKey>>) -> CoreResult<()> {
            Ok(())
        }
        async fn update_one_time_pq_kem_keys(&self, _secret_name: &str, _device_id: Uuid, _keys: Vec<SignedOneTimeKey<KemPublicKey>>) -> CoreResult<()> {
            Ok(())
        }
        async fn batch_delete_one_time_keys(&self, _secret_name: &str, _device_id: Uuid, _flavor: OneTimeKeyFlavor) -> CoreResult<()> {
            Ok(())
        }
        async fn rotate_long_term_keys(&self, _secret_name: &str, _device_id: Uuid, _signed_device: Signed<UserDeviceConfiguration>) -> CoreResult<()> {
            Ok(())
        }
        async fn notify_identity_creation(&self, _secret_name: &str, _device_id: Uuid, _consumed: ConsumedOneTimeKeys) -> CoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn generate_bundle_publishes_a_full_one_time_key_inventory() {
        let manager = IdentityManager::new(Arc::new(StubTransport::default()), CoreConfig::default());
        let bundle = manager.generate_bundle().unwrap();

        assert_eq!(bundle.configuration.signed_devices.len(), 1);
        assert_eq!(bundle.configuration.signed_one_time_public_keys.len(), 100);
        assert_eq!(bundle.configuration.signed_pq_kem_one_time_public_keys.len(), 100);
        assert_eq!(bundle.device_keys.one_time_private_keys.len(), 100);
        assert_eq!(bundle.device_keys.pq_kem_one_time_private_keys.len(), 100);
        assert!(bundle.configuration.verify().is_ok());
    }

    #[tokio::test]
    async fn refill_tops_curve_inventory_back_up_to_target_after_consumption() {
        let manager = IdentityManager::new(Arc::new(StubTransport::default()), CoreConfig::default());
        let bundle = manager.generate_bundle().unwrap();
        let device_id = bundle.configuration.signed_devices[0].value.device_id;
        let authorizing_secret = bundle.device_keys.signing_private_key.clone();
        let mut device_keys = bundle.device_keys;
        let mut configuration = bundle.configuration;

        let surviving: Vec<Uuid> = configuration
            .signed_one_time_public_keys
            .iter()
            .map(|k| k.id)
            .take(5)
            .collect();
        let transport = Arc::new(StubTransport {
            remote_curve_ids: StdMutex::new(surviving),
        });
        let manager = IdentityManager::new(transport, CoreConfig::default());

        manager
            .refill_curve_one_time_keys("alice", device_id, &mut device_keys, &mut configuration, &authorizing_secret)
            .await
            .unwrap();

        assert_eq!(configuration.signed_one_time_public_keys.len(), 100);
        assert_eq!(device_keys.one_time_private_keys.len(), 100);
        let published_ids: std::collections::HashSet<Uuid> = configuration.signed_one_time_public_keys.iter().map(|k| k.id).collect();
        let private_ids: std::collections::HashSet<Uuid> = device_keys.one_time_private_keys.iter().map(|e| e.id).collect();
        assert!(private_ids.is_superset(&published_ids));
    }

    #[tokio::test]
    async fn rotate_scheduled_is_a_no_op_before_the_rotation_date() {
        let manager = IdentityManager::new(Arc::new(StubTransport::default()), CoreConfig::default());
        let bundle = manager.generate_bundle().unwrap();
        let device_id = bundle.configuration.signed_devices[0].value.device_id;
        let authorizing_secret = bundle.device_keys.signing_private_key.clone();
        let mut device_keys = bundle.device_keys;
        let mut configuration = bundle.configuration;
        let original_kem = device_keys.final_pq_kem_private_key.0.clone();

        manager
            .rotate_scheduled("alice", device_id, &mut device_keys, &mut configuration, &authorizing_secret)
            .await
            .unwrap();

        assert_eq!(device_keys.final_pq_kem_private_key.0, original_kem);
    }

    #[tokio::test]
    async fn rotate_on_compromise_reissues_signing_long_term_and_reserve_kem_keys() {
        let manager = IdentityManager::new(Arc::new(StubTransport::default()), CoreConfig::default());
        let bundle = manager.generate_bundle().unwrap();
        let device_id = bundle.configuration.signed_devices[0].value.device_id;
        let authorizing_secret = bundle.device_keys.signing_private_key.clone();
        let mut device_keys = bundle.device_keys;
        let mut configuration = bundle.configuration;
        let original_long_term = device_keys.long_term_private_key.0;

        manager
            .rotate_on_compromise("alice", device_id, &mut device_keys, &mut configuration, &authorizing_secret)
            .await
            .unwrap();

        assert_ne!(device_keys.long_term_private_key.0, original_long_term);
        let resigned = configuration.find_device(device_id).unwrap();
        assert!(resigned.verify(&configuration.signing_public_key).is_ok());
    }
}
