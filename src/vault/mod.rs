//! Session Context Vault (§4.6): the password-derived `K_app` that gates
//! the single root `SessionContext` ciphertext.

use std::sync::Arc;

use rand::RngCore;

use crate::collaborators::store::Store;
use crate::crypto::{aead_decrypt, aead_encrypt, derive_app_key};
use crate::error::{CoreError, CoreResult};
use crate::session_context::SessionContext;

const SALT_LEN: usize = 32;

pub struct SessionContextVault {
    store: Arc<dyn Store>,
}

impl SessionContextVault {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Opens the persisted root blob under the password, minting a salt if
    /// this is the very first open for this installation.
    pub async fn open(&self, password: &str) -> CoreResult<SessionContext> {
        let password_bytes = password.as_bytes();
        let salt = self.salt_for(password_bytes).await?;
        let app_key = derive_app_key(password_bytes, &salt)?;

        let blob = self
            .store
            .fetch_session_context_blob()
            .await?
            .ok_or(CoreError::DatabaseNotInitialized)?;
        let plaintext = aead_decrypt(&app_key, &blob).map_err(|_| CoreError::InvalidPassword)?;
        serde_json::from_slice(&plaintext).map_err(Into::into)
    }

    /// Encrypts and persists `context` under the password currently in
    /// effect, minting a salt if this is a brand-new installation.
    pub async fn seal(&self, password: &str, context: &SessionContext) -> CoreResult<()> {
        let password_bytes = password.as_bytes();
        let salt = self.salt_for(password_bytes).await?;
        let app_key = derive_app_key(password_bytes, &salt)?;

        let plaintext = serde_json::to_vec(context)?;
        let blob = aead_encrypt(&app_key, &plaintext)?;
        self.store.write_session_context_blob(blob).await
    }

    /// §4.6 "Password change": decrypt under the old password, mint a fresh
    /// salt for the new one, and re-encrypt under the new `K_app`. The root
    /// blob is the only thing touched — `K_db` and every row it encrypts
    /// are untouched.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> CoreResult<SessionContext> {
        let context = self.open(old_password).await?;
        self.store
            .delete_local_device_salt(old_password.as_bytes())
            .await?;
        self.seal(new_password, &context).await?;
        Ok(context)
    }

    /// §4.6 "Password verification": attempts to open the persisted blob
    /// under `password`, reporting success or failure without mutating
    /// anything observable beyond the salt lookup.
    pub async fn verify_password(&self, password: &str) -> bool {
        self.open(password).await.is_ok()
    }

    async fn salt_for(&self, password_bytes: &[u8]) -> CoreResult<Vec<u8>> {
        if let Some(salt) = self.store.fetch_local_device_salt(password_bytes).await? {
            return Ok(salt);
        }
        let mut salt = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        self.store
            .write_local_device_salt(password_bytes, salt.clone())
            .await?;
        Ok(salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entities::{BaseCommunication, ContactModel, DataPacket, EncryptedMessage, MediaJob};
    use crate::crypto::keys::SymmetricKey;
    use crate::crypto::{generate_ed25519_keypair, generate_kem_keypair, generate_x25519_keypair};
    use crate::identity::bundle::UserConfiguration;
    use crate::identity::device_keys::DeviceKeys;
    use crate::jobs::model::JobModel;
    use crate::session::identity::SessionIdentity;
    use crate::session_context::{RegistrationState, SessionUser};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct MemoryStore {
        blob: StdMutex<Option<Vec<u8>>>,
        salts: StdMutex<std::collections::HashMap<Vec<u8>, Vec<u8>>>,
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn fetch_session_context_blob(&self) -> CoreResult<Option<Vec<u8>>> {
            Ok(self.blob.lock().unwrap().clone())
        }
        async fn write_session_context_blob(&self, blob: Vec<u8>) -> CoreResult<()> {
            *self.blob.lock().unwrap() = Some(blob);
            Ok(())
        }
        async fn fetch_local_device_salt(&self, key_data: &[u8]) -> CoreResult<Option<Vec<u8>>> {
            Ok(self.salts.lock().unwrap().get(key_data).cloned())
        }
        async fn write_local_device_salt(&self, key_data: &[u8], salt: Vec<u8>) -> CoreResult<()> {
            self.salts.lock().unwrap().insert(key_data.to_vec(), salt);
            Ok(())
        }
        async fn delete_local_device_salt(&self, key_data: &[u8]) -> CoreResult<()> {
            self.salts.lock().unwrap().remove(key_data);
            Ok(())
        }
        async fn create_session_identity(&self, _identity: SessionIdentity) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_session_identities(&self) -> CoreResult<Vec<SessionIdentity>> {
            Ok(Vec::new())
        }
        async fn update_session_identity(&self, _identity: SessionIdentity) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_session_identity(&self, _secret_name: &str, _device_id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_message(&self, _message: EncryptedMessage) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_message_by_id(&self, _id: Uuid) -> CoreResult<Option<EncryptedMessage>> {
            Ok(None)
        }
        async fn fetch_message_by_shared_id(&self, _shared_id: &str) -> CoreResult<Option<EncryptedMessage>> {
            Ok(None)
        }
        async fn fetch_all_messages(&self) -> CoreResult<Vec<EncryptedMessage>> {
            Ok(Vec::new())
        }
        async fn update_message(&self, _message: EncryptedMessage) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_message(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_communication(&self, _communication: BaseCommunication) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_communications(&self) -> CoreResult<Vec<BaseCommunication>> {
            Ok(Vec::new())
        }
        async fn update_communication(&self, _communication: BaseCommunication) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_communication(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_contact(&self, _contact: ContactModel) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_contacts(&self) -> CoreResult<Vec<ContactModel>> {
            Ok(Vec::new())
        }
        async fn update_contact(&self, _contact: ContactModel) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_contact(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_job(&self, _job: JobModel) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_jobs(&self) -> CoreResult<Vec<JobModel>> {
            Ok(Vec::new())
        }
        async fn delete_job(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_data_packet(&self, _packet: DataPacket) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_data_packet(&self, _id: Uuid) -> CoreResult<Option<DataPacket>> {
            Ok(None)
        }
        async fn delete_data_packet(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_media_job(&self, _job: MediaJob) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_media_job(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
    }

    fn sample_context() -> SessionContext {
        let signing = generate_ed25519_keypair();
        let long_term = generate_x25519_keypair();
        let kem = generate_kem_keypair();
        SessionContext {
            session_user: SessionUser {
                secret_name: "alice".into(),
                device_id: Uuid::new_v4(),
                authorizing_secret: signing.secret.clone(),
                device_keys: DeviceKeys {
                    signing_private_key: signing.secret,
                    long_term_private_key: long_term.secret,
                    one_time_private_keys: Vec::new(),
                    pq_kem_one_time_private_keys: Vec::new(),
                    final_pq_kem_private_key: kem.secret,
                    rotate_keys_date: chrono::Utc::now() + chrono::Duration::days(7),
                },
            },
            database_encryption_key: SymmetricKey::from_bytes([1u8; 32]),
            session_context_id: 1,
            active_user_configuration: UserConfiguration {
                signing_public_key: signing.public,
                signed_devices: Vec::new(),
                signed_one_time_public_keys: Vec::new(),
                signed_pq_kem_one_time_public_keys: Vec::new(),
            },
            registration_state: RegistrationState::Registered,
        }
    }

    #[tokio::test]
    async fn seal_then_open_round_trips() {
        let vault = SessionContextVault::new(Arc::new(MemoryStore::default()));
        let context = sample_context();
        vault.seal("p@ss1", &context).await.unwrap();

        let opened = vault.open("p@ss1").await.unwrap();
        assert_eq!(opened.session_user.secret_name, "alice");
        assert!(vault.verify_password("p@ss1").await);
        assert!(!vault.verify_password("wrong").await);
    }

    #[tokio::test]
    async fn change_password_invalidates_old_password() {
        let vault = SessionContextVault::new(Arc::new(MemoryStore::default()));
        let context = sample_context();
        vault.seal("p@ss1", &context).await.unwrap();

        vault.change_password("p@ss1", "p@ss2").await.unwrap();
        assert!(vault.verify_password("p@ss2").await);
        assert!(!vault.verify_password("p@ss1").await);
    }
}
