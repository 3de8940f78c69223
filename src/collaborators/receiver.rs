//! The event receiver collaborator (§6). Fire-and-forget notifications
//! from the core's point of view.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::cache::entities::{BaseCommunication, ContactModel, EncryptedMessage};
use crate::identity::device_config::UserDeviceConfiguration;

#[async_trait]
pub trait EventReceiver: Send + Sync {
    async fn created_message(&self, message: EncryptedMessage);
    async fn updated_message(&self, message: EncryptedMessage);
    async fn deleted_message(&self, id: Uuid);
    async fn create_contact(&self, contact: ContactModel);
    async fn update_contact(&self, contact: ContactModel);
    async fn contact_metadata_changed(&self, contact_id: Uuid, metadata: serde_json::Value);
    async fn updated_communication(&self, communication: BaseCommunication, members: HashSet<String>);
    /// A device-linking request arrived for the embedder's UI to surface.
    async fn new_device_request(&self, configuration: UserDeviceConfiguration);
}
