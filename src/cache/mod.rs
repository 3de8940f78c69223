//! Cache Layer (§4.7): a single `RwLock`-guarded in-memory mirror of the
//! store, so hot-path reads never round-trip to disk.

pub mod entities;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::collaborators::store::Store;
use crate::error::{CoreError, CoreResult};
use crate::session::identity::SessionIdentity;
use crate::session_context::SessionContext;

use entities::{BaseCommunication, ContactModel, DataPacket, EncryptedMessage, MediaJob};

/// A synchronizer invoked whenever the root session-context ciphertext is
/// written, so the session layer can mirror the new context without
/// polling the vault (§4.7 "Synchronizer hook").
pub type Synchronizer = Arc<dyn Fn(&SessionContext) + Send + Sync>;

#[derive(Default)]
struct CacheInner {
    session_identities: HashMap<(String, Uuid), SessionIdentity>,
    session_identities_loaded: bool,

    messages: HashMap<Uuid, EncryptedMessage>,
    messages_by_shared_id: HashMap<String, Uuid>,
    messages_loaded: bool,

    communications: HashMap<Uuid, BaseCommunication>,
    communications_loaded: bool,

    contacts: HashMap<Uuid, ContactModel>,
    contacts_loaded: bool,

    jobs: HashMap<Uuid, crate::jobs::model::JobModel>,
    jobs_loaded: bool,
}

/// The in-memory mirror of every entity type the store persists. One lock
/// guards the whole structure rather than one per entity, since most
/// operations here are cheap HashMap lookups, not I/O (§4.7).
pub struct Cache {
    store: Arc<dyn Store>,
    inner: RwLock<CacheInner>,
    synchronizer: std::sync::Mutex<Option<Synchronizer>>,
}

impl Cache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            inner: RwLock::new(CacheInner::default()),
            synchronizer: std::sync::Mutex::new(None),
        }
    }

    pub fn set_synchronizer(&self, synchronizer: Synchronizer) {
        *self.synchronizer.lock().unwrap() = Some(synchronizer);
    }

    /// Persists the root context ciphertext and fires the synchronizer
    /// hook. Called by the vault's caller, not the vault itself, so the
    /// cache stays the only place that knows about the synchronizer.
    pub fn notify_session_context_written(&self, context: &SessionContext) {
        if let Some(synchronizer) = self.synchronizer.lock().unwrap().as_ref() {
            synchronizer(context);
        }
    }

    // --- SessionIdentity ---

    pub async fn create_session_identity(&self, identity: SessionIdentity) -> CoreResult<()> {
        self.store.create_session_identity(identity.clone()).await?;
        let mut inner = self.inner.write().await;
        inner
            .session_identities
            .insert((identity.secret_name.clone(), identity.device_id), identity);
        Ok(())
    }

    pub async fn fetch_all_session_identities(&self) -> CoreResult<Vec<SessionIdentity>> {
        let mut inner = self.inner.write().await;
        if !inner.session_identities_loaded {
            let rows = self.store.fetch_all_session_identities().await?;
            for row in rows {
                inner
                    .session_identities
                    .insert((row.secret_name.clone(), row.device_id), row);
            }
            inner.session_identities_loaded = true;
        }
        Ok(inner.session_identities.values().cloned().collect())
    }

    pub async fn update_session_identity(&self, identity: SessionIdentity) -> CoreResult<()> {
        let key = (identity.secret_name.clone(), identity.device_id);
        let mut inner = self.inner.write().await;
        if !inner.session_identities.contains_key(&key) {
            return Err(CoreError::MissingSessionIdentity {
                secret_name: identity.secret_name,
                device_id: identity.device_id,
            });
        }
        self.store.update_session_identity(identity.clone()).await?;
        inner.session_identities.insert(key, identity);
        Ok(())
    }

    pub async fn delete_session_identity(&self, secret_name: &str, device_id: Uuid) -> CoreResult<()> {
        self.store.delete_session_identity(secret_name, device_id).await?;
        let mut inner = self.inner.write().await;
        inner
            .session_identities
            .remove(&(secret_name.to_string(), device_id));
        Ok(())
    }

    // --- EncryptedMessage ---

    pub async fn create_message(&self, message: EncryptedMessage) -> CoreResult<()> {
        self.store.create_message(message.clone()).await?;
        let mut inner = self.inner.write().await;
        inner
            .messages_by_shared_id
            .insert(message.shared_id.clone(), message.id);
        inner.messages.insert(message.id, message);
        Ok(())
    }

    pub async fn fetch_message_by_id(&self, id: Uuid) -> CoreResult<Option<EncryptedMessage>> {
        {
            let inner = self.inner.read().await;
            if let Some(message) = inner.messages.get(&id) {
                return Ok(Some(message.clone()));
            }
        }
        let fetched = self.store.fetch_message_by_id(id).await?;
        if let Some(message) = &fetched {
            let mut inner = self.inner.write().await;
            inner
                .messages_by_shared_id
                .insert(message.shared_id.clone(), message.id);
            inner.messages.insert(message.id, message.clone());
        }
        Ok(fetched)
    }

    pub async fn fetch_message_by_shared_id(&self, shared_id: &str) -> CoreResult<Option<EncryptedMessage>> {
        {
            let inner = self.inner.read().await;
            if let Some(id) = inner.messages_by_shared_id.get(shared_id) {
                return Ok(inner.messages.get(id).cloned());
            }
        }
        let fetched = self.store.fetch_message_by_shared_id(shared_id).await?;
        if let Some(message) = &fetched {
            let mut inner = self.inner.write().await;
            inner
                .messages_by_shared_id
                .insert(message.shared_id.clone(), message.id);
            inner.messages.insert(message.id, message.clone());
        }
        Ok(fetched)
    }

    pub async fn fetch_all_messages(&self) -> CoreResult<Vec<EncryptedMessage>> {
        let mut inner = self.inner.write().await;
        if !inner.messages_loaded {
            let rows = self.store.fetch_all_messages().await?;
            for row in rows {
                inner.messages_by_shared_id.insert(row.shared_id.clone(), row.id);
                inner.messages.insert(row.id, row);
            }
            inner.messages_loaded = true;
        }
        Ok(inner.messages.values().cloned().collect())
    }

    pub async fn update_message(&self, message: EncryptedMessage) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.messages.contains_key(&message.id) {
            return Err(CoreError::MissingMessage);
        }
        self.store.update_message(message.clone()).await?;
        inner
            .messages_by_shared_id
            .insert(message.shared_id.clone(), message.id);
        inner.messages.insert(message.id, message);
        Ok(())
    }

    pub async fn delete_message(&self, id: Uuid) -> CoreResult<()> {
        self.store.delete_message(id).await?;
        let mut inner = self.inner.write().await;
        if let Some(message) = inner.messages.remove(&id) {
            inner.messages_by_shared_id.remove(&message.shared_id);
        }
        Ok(())
    }

    // --- BaseCommunication ---

    pub async fn create_communication(&self, communication: BaseCommunication) -> CoreResult<()> {
        self.store.create_communication(communication.clone()).await?;
        let mut inner = self.inner.write().await;
        inner.communications.insert(communication.id, communication);
        Ok(())
    }

    pub async fn fetch_all_communications(&self) -> CoreResult<Vec<BaseCommunication>> {
        let mut inner = self.inner.write().await;
        if !inner.communications_loaded {
            let rows = self.store.fetch_all_communications().await?;
            for row in rows {
                inner.communications.insert(row.id, row);
            }
            inner.communications_loaded = true;
        }
        Ok(inner.communications.values().cloned().collect())
    }

    pub async fn update_communication(&self, communication: BaseCommunication) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.communications.contains_key(&communication.id) {
            return Err(CoreError::CannotFindCommunication(communication.id.to_string()));
        }
        self.store.update_communication(communication.clone()).await?;
        inner.communications.insert(communication.id, communication);
        Ok(())
    }

    pub async fn delete_communication(&self, id: Uuid) -> CoreResult<()> {
        self.store.delete_communication(id).await?;
        self.inner.write().await.communications.remove(&id);
        Ok(())
    }

    // --- ContactModel ---

    pub async fn create_contact(&self, contact: ContactModel) -> CoreResult<()> {
        self.store.create_contact(contact.clone()).await?;
        let mut inner = self.inner.write().await;
        inner.contacts.insert(contact.id, contact);
        Ok(())
    }

    pub async fn fetch_all_contacts(&self) -> CoreResult<Vec<ContactModel>> {
        let mut inner = self.inner.write().await;
        if !inner.contacts_loaded {
            let rows = self.store.fetch_all_contacts().await?;
            for row in rows {
                inner.contacts.insert(row.id, row);
            }
            inner.contacts_loaded = true;
        }
        Ok(inner.contacts.values().cloned().collect())
    }

    pub async fn update_contact(&self, contact: ContactModel) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.contacts.contains_key(&contact.id) {
            return Err(CoreError::CannotFindContact(contact.id.to_string()));
        }
        self.store.update_contact(contact.clone()).await?;
        inner.contacts.insert(contact.id, contact);
        Ok(())
    }

    pub async fn delete_contact(&self, id: Uuid) -> CoreResult<()> {
        self.store.delete_contact(id).await?;
        self.inner.write().await.contacts.remove(&id);
        Ok(())
    }

    // --- JobModel ---

    pub async fn create_job(&self, job: crate::jobs::model::JobModel) -> CoreResult<()> {
        self.store.create_job(job.clone()).await?;
        self.inner.write().await.jobs.insert(job.id, job);
        Ok(())
    }

    pub async fn fetch_all_jobs(&self) -> CoreResult<Vec<crate::jobs::model::JobModel>> {
        let mut inner = self.inner.write().await;
        if !inner.jobs_loaded {
            let rows = self.store.fetch_all_jobs().await?;
            for row in rows {
                inner.jobs.insert(row.id, row);
            }
            inner.jobs_loaded = true;
        }
        Ok(inner.jobs.values().cloned().collect())
    }

    pub async fn delete_job(&self, id: Uuid) -> CoreResult<()> {
        self.store.delete_job(id).await?;
        self.inner.write().await.jobs.remove(&id);
        Ok(())
    }

    // --- DataPacket / MediaJob: lifecycle only, not mirrored in memory ---

    pub async fn create_data_packet(&self, packet: DataPacket) -> CoreResult<()> {
        self.store.create_data_packet(packet).await
    }

    pub async fn fetch_data_packet(&self, id: Uuid) -> CoreResult<Option<DataPacket>> {
        self.store.fetch_data_packet(id).await
    }

    pub async fn delete_data_packet(&self, id: Uuid) -> CoreResult<()> {
        self.store.delete_data_packet(id).await
    }

    pub async fn create_media_job(&self, job: MediaJob) -> CoreResult<()> {
        self.store.create_media_job(job).await
    }

    pub async fn delete_media_job(&self, id: Uuid) -> CoreResult<()> {
        self.store.delete_media_job(id).await
    }

    /// Wipes the in-memory mirror without touching the store (§4.7
    /// "clearCache").
    pub async fn clear(&self) {
        *self.inner.write().await = CacheInner::default();
    }

    /// Forces every primary list to reload from the store on next access
    /// (§4.7 "refreshCache").
    pub async fn refresh(&self) -> CoreResult<()> {
        self.clear().await;
        self.fetch_all_session_identities().await?;
        self.fetch_all_messages().await?;
        self.fetch_all_communications().await?;
        self.fetch_all_contacts().await?;
        self.fetch_all_jobs().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entities::{CommunicationProps, CommunicationType};
    use async_trait::async_trait;
    use std::collections::HashSet as StdHashSet;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MemoryStore {
        communications: StdMutex<HashMap<Uuid, BaseCommunication>>,
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn fetch_session_context_blob(&self) -> CoreResult<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn write_session_context_blob(&self, _blob: Vec<u8>) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_local_device_salt(&self, _key_data: &[u8]) -> CoreResult<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn write_local_device_salt(&self, _key_data: &[u8], _salt: Vec<u8>) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_local_device_salt(&self, _key_data: &[u8]) -> CoreResult<()> {
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
        async fn create_communication(&self, communication: BaseCommunication) -> CoreResult<()> {
            self.communications.lock().unwrap().insert(communication.id, communication);
            Ok(())
        }
        async fn fetch_all_communications(&self) -> CoreResult<Vec<BaseCommunication>> {
            Ok(self.communications.lock().unwrap().values().cloned().collect())
        }
        async fn update_communication(&self, communication: BaseCommunication) -> CoreResult<()> {
            self.communications.lock().unwrap().insert(communication.id, communication);
            Ok(())
        }
        async fn delete_communication(&self, id: Uuid) -> CoreResult<()> {
            self.communications.lock().unwrap().remove(&id);
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
        async fn create_job(&self, _job: crate::jobs::model::JobModel) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_jobs(&self) -> CoreResult<Vec<crate::jobs::model::JobModel>> {
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

    fn sample_communication() -> BaseCommunication {
        BaseCommunication {
            id: Uuid::new_v4(),
            props: CommunicationProps {
                message_count: 0,
                members: StdHashSet::new(),
                metadata: serde_json::Value::Null,
                blocked_members: StdHashSet::new(),
                communication_type: CommunicationType::PersonalMessage,
                shared_id: None,
            },
        }
    }

    #[tokio::test]
    async fn update_fails_when_not_in_memory() {
        let cache = Cache::new(Arc::new(MemoryStore::default()));
        let communication = sample_communication();
        let result = cache.update_communication(communication).await;
        assert!(matches!(result, Err(CoreError::CannotFindCommunication(_))));
    }

    #[tokio::test]
    async fn fetch_all_lazily_populates_then_update_succeeds() {
        let store = Arc::new(MemoryStore::default());
        let communication = sample_communication();
        store.create_communication(communication.clone()).await.unwrap();

        let cache = Cache::new(store);
        let all = cache.fetch_all_communications().await.unwrap();
        assert_eq!(all.len(), 1);

        let mut updated = communication.clone();
        updated.props.message_count = 1;
        cache.update_communication(updated).await.unwrap();

        let all = cache.fetch_all_communications().await.unwrap();
        assert_eq!(all[0].props.message_count, 1);
    }

    #[tokio::test]
    async fn clear_wipes_memory_not_store() {
        let store = Arc::new(MemoryStore::default());
        let communication = sample_communication();
        store.create_communication(communication.clone()).await.unwrap();

        let cache = Cache::new(store);
        cache.fetch_all_communications().await.unwrap();
        cache.clear().await;

        let result = cache.update_communication(communication).await;
        assert!(matches!(result, Err(CoreError::CannotFindCommunication(_))));
    }
}
