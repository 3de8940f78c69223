//! Session Identity Cache (§4.3): discovers and maintains the local,
//! ratchet-ready record of every device belonging to a peer (and the
//! caller's own other devices, so outbound fan-out always reaches them
//! too).

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

use crate::collaborators::store::Store;
use crate::collaborators::transport::{ConfigurationLookup, ConsumedOneTimeKeys, Transport};
use crate::error::{CoreError, CoreResult};

use super::identity::SessionIdentity;

pub struct SessionIdentityCache {
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
}

impl SessionIdentityCache {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn Store>) -> Self {
        Self { transport, store }
    }

    /// Refreshes the cached devices for `peer_secret_name` against the
    /// remote bundle, materializing newly seen devices and pruning ones
    /// the bundle no longer lists. Returns every relevant cached identity
    /// after the refresh (peer devices plus the caller's other devices).
    pub async fn refresh(
        &self,
        local_secret_name: &str,
        local_device_id: Uuid,
        peer_secret_name: &str,
    ) -> CoreResult<Vec<SessionIdentity>> {
        let all_cached = self.store.fetch_all_session_identities().await?;
        let mut relevant: Vec<SessionIdentity> = all_cached
            .into_iter()
            .filter(|identity| {
                identity.secret_name == peer_secret_name
                    || (identity.secret_name == local_secret_name && identity.device_id != local_device_id)
            })
            .collect();

        let peer_configuration = match self.transport.find_configuration(peer_secret_name).await? {
            ConfigurationLookup::Exists(configuration) => configuration,
            ConfigurationLookup::Absent => {
                return Err(CoreError::CannotFindUserConfiguration(peer_secret_name.to_string()));
            }
        };
        peer_configuration.verify()?;

        let existing_ids: HashSet<Uuid> = relevant
            .iter()
            .filter(|identity| identity.secret_name == peer_secret_name)
            .map(|identity| identity.device_id)
            .collect();
        let remote_ids: HashSet<Uuid> = peer_configuration.device_ids();

        let new_device_ids: Vec<Uuid> = remote_ids
            .iter()
            .copied()
            .filter(|id| !existing_ids.contains(id) && *id != local_device_id)
            .collect();

        for device_id in new_device_ids {
            let signed_device = peer_configuration
                .find_device(device_id)
                .expect("device_id drawn from this configuration's own device_ids()");

            let session_context_id = draw_session_context_id(&relevant);
            let bundle = self
                .transport
                .fetch_one_time_keys(peer_secret_name, device_id)
                .await?;

            if bundle.curve.is_none() && bundle.kyber.is_none() {
                return Err(CoreError::DrainedKeys);
            }

            let one_time_public_key = bundle.curve.as_ref().map(|k| k.public);
            let pq_kem_public_key = bundle
                .kyber
                .as_ref()
                .map(|k| k.public.clone())
                .unwrap_or_else(|| signed_device.value.final_pq_kem_public_key.clone());

            let device_name = assign_device_name(&relevant, signed_device.value.device_name.as_deref());

            let identity = SessionIdentity {
                secret_name: peer_secret_name.to_string(),
                device_id,
                session_context_id,
                long_term_public_key: signed_device.value.long_term_public_key,
                signing_public_key: signed_device.value.signing_public_key,
                pq_kem_public_key,
                one_time_public_key,
                state: None,
                device_name,
                is_master_device: signed_device.value.is_master_device,
            };

            self.store.create_session_identity(identity.clone()).await?;
            self.transport
                .notify_identity_creation(
                    peer_secret_name,
                    device_id,
                    ConsumedOneTimeKeys {
                        curve_id: bundle.curve.as_ref().map(|k| k.id),
                        kyber_id: bundle.kyber.as_ref().map(|k| k.id),
                    },
                )
                .await?;
            tracing::debug!(peer = peer_secret_name, %device_id, "materialized session identity");
            relevant.push(identity);
        }

        let stale: Vec<Uuid> = relevant
            .iter()
            .filter(|identity| identity.secret_name == peer_secret_name && !remote_ids.contains(&identity.device_id))
            .map(|identity| identity.device_id)
            .collect();
        for device_id in stale {
            self.store.delete_session_identity(peer_secret_name, device_id).await?;
            tracing::debug!(peer = peer_secret_name, %device_id, "pruned stale session identity");
            relevant.retain(|identity| !(identity.secret_name == peer_secret_name && identity.device_id == device_id));
        }

        Ok(relevant)
    }
}

fn draw_session_context_id(existing: &[SessionIdentity]) -> u64 {
    loop {
        let candidate: u64 = rand::thread_rng().gen_range(1..(1u64 << 63));
        if !existing.iter().any(|identity| identity.session_context_id == candidate) {
            return candidate;
        }
    }
}

fn assign_device_name(existing: &[SessionIdentity], hint: Option<&str>) -> String {
    let base = hint.unwrap_or("Unknown Device");
    if !existing.iter().any(|identity| identity.device_name == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base} ({n})");
        if !existing.iter().any(|identity| identity.device_name == candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_name_disambiguates_on_collision() {
        let existing = vec![sample_identity("Pixel 7")];
        assert_eq!(assign_device_name(&existing, Some("Pixel 7")), "Pixel 7 (2)");
        assert_eq!(assign_device_name(&existing, Some("Pixel 8")), "Pixel 8");
        assert_eq!(assign_device_name(&[], None), "Unknown Device");
    }

    fn sample_identity(device_name: &str) -> SessionIdentity {
        use crate::crypto::{generate_ed25519_keypair, generate_kem_keypair, generate_x25519_keypair};
        SessionIdentity {
            secret_name: "peer".into(),
            device_id: Uuid::new_v4(),
            session_context_id: 1,
            long_term_public_key: generate_x25519_keypair().public,
            signing_public_key: generate_ed25519_keypair().public,
            pq_kem_public_key: generate_kem_keypair().public,
            one_time_public_key: None,
            state: None,
            device_name: device_name.to_string(),
            is_master_device: true,
        }
    }
}
