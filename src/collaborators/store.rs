//! The persistent store collaborator (§6). Row-level CRUD for every entity
//! type in §3, plus the password-salt primitives. Storage is opaque bytes;
//! integrity is the cache layer's responsibility, not the store's.

use async_trait::async_trait;
use uuid::Uuid;

use crate::cache::entities::{BaseCommunication, ContactModel, DataPacket, EncryptedMessage, MediaJob};
use crate::error::CoreResult;
use crate::jobs::model::JobModel;
use crate::session::identity::SessionIdentity;

#[async_trait]
pub trait Store: Send + Sync {
    // --- SessionContext (single ciphertext blob per installation) ---
    async fn fetch_session_context_blob(&self) -> CoreResult<Option<Vec<u8>>>;
    async fn write_session_context_blob(&self, blob: Vec<u8>) -> CoreResult<()>;

    // --- Password salt, keyed by the password bytes it was minted for ---
    async fn fetch_local_device_salt(&self, key_data: &[u8]) -> CoreResult<Option<Vec<u8>>>;
    async fn write_local_device_salt(&self, key_data: &[u8], salt: Vec<u8>) -> CoreResult<()>;
    async fn delete_local_device_salt(&self, key_data: &[u8]) -> CoreResult<()>;

    // --- SessionIdentity ---
    async fn create_session_identity(&self, identity: SessionIdentity) -> CoreResult<()>;
    async fn fetch_all_session_identities(&self) -> CoreResult<Vec<SessionIdentity>>;
    async fn update_session_identity(&self, identity: SessionIdentity) -> CoreResult<()>;
    async fn delete_session_identity(&self, secret_name: &str, device_id: Uuid) -> CoreResult<()>;

    // --- EncryptedMessage ---
    async fn create_message(&self, message: EncryptedMessage) -> CoreResult<()>;
    async fn fetch_message_by_id(&self, id: Uuid) -> CoreResult<Option<EncryptedMessage>>;
    async fn fetch_message_by_shared_id(&self, shared_id: &str) -> CoreResult<Option<EncryptedMessage>>;
    async fn fetch_all_messages(&self) -> CoreResult<Vec<EncryptedMessage>>;
    async fn update_message(&self, message: EncryptedMessage) -> CoreResult<()>;
    async fn delete_message(&self, id: Uuid) -> CoreResult<()>;

    // --- BaseCommunication ---
    async fn create_communication(&self, communication: BaseCommunication) -> CoreResult<()>;
    async fn fetch_all_communications(&self) -> CoreResult<Vec<BaseCommunication>>;
    async fn update_communication(&self, communication: BaseCommunication) -> CoreResult<()>;
    async fn delete_communication(&self, id: Uuid) -> CoreResult<()>;

    // --- ContactModel ---
    async fn create_contact(&self, contact: ContactModel) -> CoreResult<()>;
    async fn fetch_all_contacts(&self) -> CoreResult<Vec<ContactModel>>;
    async fn update_contact(&self, contact: ContactModel) -> CoreResult<()>;
    async fn delete_contact(&self, id: Uuid) -> CoreResult<()>;

    // --- JobModel ---
    async fn create_job(&self, job: JobModel) -> CoreResult<()>;
    async fn fetch_all_jobs(&self) -> CoreResult<Vec<JobModel>>;
    async fn delete_job(&self, id: Uuid) -> CoreResult<()>;

    // --- MediaJob / DataPacket (lifecycle only, §3) ---
    async fn create_data_packet(&self, packet: DataPacket) -> CoreResult<()>;
    async fn fetch_data_packet(&self, id: Uuid) -> CoreResult<Option<DataPacket>>;
    async fn delete_data_packet(&self, id: Uuid) -> CoreResult<()>;
    async fn create_media_job(&self, job: MediaJob) -> CoreResult<()>;
    async fn delete_media_job(&self, id: Uuid) -> CoreResult<()>;
}
