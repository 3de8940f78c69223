//! Event Orchestration (§4.8): turns an application-level send into one
//! `writeMessage` job per target device, and turns an inbound delivery
//! into at most one `streamMessage` job, filtering duplicates the
//! transport has already delivered once.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::entities::{
    BaseCommunication, CommunicationProps, CommunicationType, DeliveryState, EncryptedMessage, MessageProps,
};
use crate::cache::Cache;
use crate::collaborators::transport::PushType;
use crate::crypto_message::{CryptoMessage, Recipient};
use crate::error::CoreResult;
use crate::jobs::model::{InboundTaskMessage, OutboundTaskMessage};
use crate::jobs::JobProcessor;
use crate::session::identity::SessionIdentity;
use crate::session::identity_cache::SessionIdentityCache;

/// Routes outbound sends to every device a [`Recipient`] resolves to, and
/// filters re-delivered inbound messages before they ever reach the job
/// queue.
pub struct Orchestrator {
    cache: Arc<Cache>,
    identity_cache: Arc<SessionIdentityCache>,
    processor: Arc<JobProcessor>,
    /// `(senderSecretName, senderDeviceId, sharedMessageId)` seen at the
    /// transport level. Populated from the store at `start_session` and
    /// grown on every first-time inbound delivery; a queued job's own
    /// retries never call back through here, so marking a key before the
    /// job finishes does not mask a legitimate retry.
    seen: Mutex<HashSet<(String, Uuid, String)>>,
}

impl Orchestrator {
    pub fn new(cache: Arc<Cache>, identity_cache: Arc<SessionIdentityCache>, processor: Arc<JobProcessor>) -> Self {
        Self {
            cache,
            identity_cache,
            processor,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub async fn start_session(&self) -> CoreResult<()> {
        let messages = self.cache.fetch_all_messages().await?;
        let mut seen = self.seen.lock().await;
        for message in messages {
            seen.insert((
                message.props.sender_secret_name,
                message.props.sender_device_id,
                message.shared_id,
            ));
        }
        Ok(())
    }

    /// Fans `message` out to every device `recipient` resolves to and
    /// returns the `sharedMessageId` all of those jobs carry. Persists the
    /// local message row before any job is enqueued, so a crash between
    /// the two never leaves a job with no local record behind it.
    pub async fn send(
        &self,
        local_secret_name: &str,
        local_device_id: Uuid,
        message: CryptoMessage,
        recipient: Recipient,
    ) -> CoreResult<String> {
        let shared_id = Uuid::new_v4().to_string();

        if matches!(recipient, Recipient::Broadcast) {
            tracing::debug!("broadcast recipient is a no-op");
            return Ok(shared_id);
        }

        if !message.flags.is_nudge() {
            self.persist_outbound(local_secret_name, local_device_id, &message, &recipient, &shared_id)
                .await?;
        }

        let targets = self
            .resolve_targets(local_secret_name, local_device_id, &recipient)
            .await?;

        for identity in targets {
            self.processor
                .enqueue_outbound(
                    OutboundTaskMessage {
                        message: message.clone(),
                        recipient_identity: identity,
                        local_id: Uuid::new_v4(),
                        shared_id: shared_id.clone(),
                        push_type: PushType::default(),
                        recipient: recipient.clone(),
                    },
                    false,
                )
                .await?;
        }

        Ok(shared_id)
    }

    /// Filters a delivery the transport has already handed us once and, for
    /// everything else, hands it to the job queue.
    pub async fn receive(&self, task: InboundTaskMessage, is_background: bool) -> CoreResult<()> {
        let key = (
            task.sender_secret_name.clone(),
            task.sender_device_id,
            task.shared_message_id.clone(),
        );
        {
            let mut seen = self.seen.lock().await;
            if !seen.insert(key) {
                tracing::debug!(shared_id = %task.shared_message_id, "duplicate inbound delivery, dropping");
                return Ok(());
            }
        }
        self.processor.enqueue_inbound(task, is_background).await?;
        Ok(())
    }

    async fn resolve_targets(
        &self,
        local_secret_name: &str,
        local_device_id: Uuid,
        recipient: &Recipient,
    ) -> CoreResult<Vec<SessionIdentity>> {
        match recipient {
            Recipient::PersonalMessage => {
                self.identity_cache
                    .refresh(local_secret_name, local_device_id, local_secret_name)
                    .await
            }
            Recipient::Nickname(name) => {
                self.identity_cache
                    .refresh(local_secret_name, local_device_id, name)
                    .await
            }
            Recipient::Channel(name) => {
                let members = self.channel_members(name).await?;
                let mut targets = Vec::new();
                let mut seen_devices = HashSet::new();
                for member in members {
                    let member_targets = self
                        .identity_cache
                        .refresh(local_secret_name, local_device_id, &member)
                        .await?;
                    for identity in member_targets {
                        if seen_devices.insert((identity.secret_name.clone(), identity.device_id)) {
                            targets.push(identity);
                        }
                    }
                }
                Ok(targets)
            }
            Recipient::Broadcast => Ok(Vec::new()),
        }
    }

    async fn channel_members(&self, channel_name: &str) -> CoreResult<Vec<String>> {
        let communications = self.cache.fetch_all_communications().await?;
        Ok(communications
            .into_iter()
            .find(|communication| {
                matches!(&communication.props.communication_type, CommunicationType::Channel(name) if name == channel_name)
            })
            .map(|communication| communication.props.members.into_iter().collect())
            .unwrap_or_default())
    }

    async fn persist_outbound(
        &self,
        local_secret_name: &str,
        local_device_id: Uuid,
        message: &CryptoMessage,
        recipient: &Recipient,
        shared_id: &str,
    ) -> CoreResult<()> {
        let communication_id = self.ensure_communication(local_secret_name, recipient).await?;

        let record = EncryptedMessage {
            id: Uuid::new_v4(),
            communication_id,
            // A fan-out send has no single ratchet pair; the per-recipient
            // context id lives on the inbound side's SessionIdentity instead.
            session_context_id: 0,
            shared_id: shared_id.to_string(),
            sequence_number: 0,
            props: MessageProps {
                message: message.clone(),
                sender_secret_name: local_secret_name.to_string(),
                sender_device_id: local_device_id,
                sent_at: Utc::now(),
                delivery_state: DeliveryState::Sending,
            },
        };
        self.cache.create_message(record).await?;
        self.bump_message_count(communication_id).await
    }

    async fn ensure_communication(&self, local_secret_name: &str, recipient: &Recipient) -> CoreResult<Uuid> {
        let key = match recipient {
            Recipient::PersonalMessage => format!("self:{local_secret_name}"),
            Recipient::Nickname(name) => format!("dm:{name}"),
            Recipient::Channel(name) => format!("channel:{name}"),
            Recipient::Broadcast => unreachable!("send() returns before persisting a broadcast"),
        };

        let communications = self.cache.fetch_all_communications().await?;
        if let Some(existing) = communications
            .into_iter()
            .find(|communication| communication.props.shared_id.as_deref() == Some(key.as_str()))
        {
            return Ok(existing.id);
        }

        let mut members = HashSet::new();
        members.insert(local_secret_name.to_string());
        if let Recipient::Nickname(name) = recipient {
            members.insert(name.clone());
        }

        let communication = BaseCommunication {
            id: Uuid::new_v4(),
            props: CommunicationProps {
                message_count: 0,
                members,
                metadata: serde_json::Value::Null,
                blocked_members: HashSet::new(),
                communication_type: match recipient {
                    Recipient::PersonalMessage => CommunicationType::PersonalMessage,
                    Recipient::Nickname(name) => CommunicationType::Nickname(name.clone()),
                    Recipient::Channel(name) => CommunicationType::Channel(name.clone()),
                    Recipient::Broadcast => unreachable!("send() returns before persisting a broadcast"),
                },
                shared_id: Some(key),
            },
        };
        let id = communication.id;
        self.cache.create_communication(communication).await?;
        Ok(id)
    }

    async fn bump_message_count(&self, communication_id: Uuid) -> CoreResult<()> {
        let communications = self.cache.fetch_all_communications().await?;
        if let Some(mut communication) = communications.into_iter().find(|c| c.id == communication_id) {
            communication.props.message_count += 1;
            self.cache.update_communication(communication).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entities::{ContactModel, DataPacket, MediaJob};
    use crate::collaborators::receiver::EventReceiver;
    use crate::collaborators::store::Store;
    use crate::collaborators::transport::{
        ConfigurationLookup, ConsumedOneTimeKeys, OneTimeKeyBundle, OneTimeKeyFlavor, SendEnvelope, Transport,
    };
    use crate::config::CoreConfig;
    use crate::crypto::{generate_ed25519_keypair, generate_kem_keypair, generate_x25519_keypair, sign};
    use crate::crypto_message::{MessageType, Recipient};
    use crate::identity::bundle::{Signed, UserConfiguration};
    use crate::identity::device_config::UserDeviceConfiguration;
    use crate::identity::device_keys::DeviceKeys;
    use crate::jobs::model::TaskType;
    use crate::jobs::{JobProcessor, JobQueue, LocalIdentity};
    use crate::session::ratchet::message::SignedRatchetMessage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MemoryStore {
        identities: StdMutex<HashMap<(String, Uuid), SessionIdentity>>,
        messages: StdMutex<HashMap<Uuid, EncryptedMessage>>,
        communications: StdMutex<HashMap<Uuid, BaseCommunication>>,
        jobs: StdMutex<HashMap<Uuid, crate::jobs::model::JobModel>>,
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
        async fn create_session_identity(&self, identity: SessionIdentity) -> CoreResult<()> {
            self.identities
                .lock()
                .unwrap()
                .insert((identity.secret_name.clone(), identity.device_id), identity);
            Ok(())
        }
        async fn fetch_all_session_identities(&self) -> CoreResult<Vec<SessionIdentity>> {
            Ok(self.identities.lock().unwrap().values().cloned().collect())
        }
        async fn update_session_identity(&self, identity: SessionIdentity) -> CoreResult<()> {
            self.identities
                .lock()
                .unwrap()
                .insert((identity.secret_name.clone(), identity.device_id), identity);
            Ok(())
        }
        async fn delete_session_identity(&self, secret_name: &str, device_id: Uuid) -> CoreResult<()> {
            self.identities.lock().unwrap().remove(&(secret_name.to_string(), device_id));
            Ok(())
        }
        async fn create_message(&self, message: EncryptedMessage) -> CoreResult<()> {
            self.messages.lock().unwrap().insert(message.id, message);
            Ok(())
        }
        async fn fetch_message_by_id(&self, id: Uuid) -> CoreResult<Option<EncryptedMessage>> {
            Ok(self.messages.lock().unwrap().get(&id).cloned())
        }
        async fn fetch_message_by_shared_id(&self, shared_id: &str) -> CoreResult<Option<EncryptedMessage>> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .values()
                .find(|m| m.shared_id == shared_id)
                .cloned())
        }
        async fn fetch_all_messages(&self) -> CoreResult<Vec<EncryptedMessage>> {
            Ok(self.messages.lock().unwrap().values().cloned().collect())
        }
        async fn update_message(&self, message: EncryptedMessage) -> CoreResult<()> {
            self.messages.lock().unwrap().insert(message.id, message);
            Ok(())
        }
        async fn delete_message(&self, id: Uuid) -> CoreResult<()> {
            self.messages.lock().unwrap().remove(&id);
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
        async fn create_job(&self, job: crate::jobs::model::JobModel) -> CoreResult<()> {
            self.jobs.lock().unwrap().insert(job.id, job);
            Ok(())
        }
        async fn fetch_all_jobs(&self) -> CoreResult<Vec<crate::jobs::model::JobModel>> {
            Ok(self.jobs.lock().unwrap().values().cloned().collect())
        }
        async fn delete_job(&self, id: Uuid) -> CoreResult<()> {
            self.jobs.lock().unwrap().remove(&id);
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

    /// Always reports `alice`'s two-device configuration, and nothing for
    /// anyone else — enough to exercise fan-out without a real directory.
    struct AliceOnlyTransport {
        configuration: UserConfiguration,
    }

    #[async_trait]
    impl Transport for AliceOnlyTransport {
        async fn send_message(&self, _message: SignedRatchetMessage, _envelope: SendEnvelope) -> CoreResult<()> {
            Ok(())
        }
        async fn find_configuration(&self, secret_name: &str) -> CoreResult<ConfigurationLookup> {
            if secret_name == "alice" {
                Ok(ConfigurationLookup::Exists(self.configuration.clone()))
            } else {
                Ok(ConfigurationLookup::Absent)
            }
        }
        async fn publish_user_configuration(&self, _configuration: UserConfiguration, _recipient_device_id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_one_time_keys(&self, _secret_name: &str, _device_id: Uuid) -> CoreResult<OneTimeKeyBundle> {
            Ok(OneTimeKeyBundle::default())
        }
        async fn fetch_one_time_key_identities(&self, _secret_name: &str, _device_id: Uuid, _flavor: OneTimeKeyFlavor) -> CoreResult<Vec<Uuid>> {
            Ok(Vec::new())
        }
        async fn update_one_time_keys(&self, _secret_name: &str, _device_id: Uuid, _keys: Vec<crate::identity::bundle::SignedOneTimeKey<crate::crypto::keys::X25519PublicKey>>) -> CoreResult<()> {
            Ok(())
        }
        async fn update_one_time_pq_kem_keys(&self, _secret_name: &str, _device_id: Uuid, _keys: Vec<crate::identity::bundle::SignedOneTimeKey<crate::crypto::keys::KemPublicKey>>) -> CoreResult<()> {
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

    struct NoopReceiver;

    #[async_trait]
    impl EventReceiver for NoopReceiver {
        async fn created_message(&self, _message: EncryptedMessage) {}
        async fn updated_message(&self, _message: EncryptedMessage) {}
        async fn deleted_message(&self, _id: Uuid) {}
        async fn create_contact(&self, _contact: ContactModel) {}
        async fn update_contact(&self, _contact: ContactModel) {}
        async fn contact_metadata_changed(&self, _contact_id: Uuid, _metadata: serde_json::Value) {}
        async fn updated_communication(&self, _communication: BaseCommunication, _members: std::collections::HashSet<String>) {}
        async fn new_device_request(&self, _configuration: UserDeviceConfiguration) {}
    }

    fn device(device_id: Uuid, signing: &crate::crypto::keys::Ed25519KeyPair, is_master: bool, name: &str) -> Signed<UserDeviceConfiguration> {
        let long_term = generate_x25519_keypair();
        let kem = generate_kem_keypair();
        let value = UserDeviceConfiguration {
            device_id,
            signing_public_key: signing.public,
            long_term_public_key: long_term.public,
            final_pq_kem_public_key: kem.public,
            device_name: Some(name.to_string()),
            hmac_data: [0u8; 32],
            is_master_device: is_master,
        };
        let bytes = bincode::serialize(&value).unwrap();
        let signature = sign(&signing.secret, &bytes);
        Signed { value, signature }
    }

    async fn setup() -> (Arc<MemoryStore>, Arc<Orchestrator>, Uuid, Uuid) {
        let signing = generate_ed25519_keypair();
        let local_device_id = Uuid::new_v4();
        let other_device_id = Uuid::new_v4();
        let configuration = UserConfiguration {
            signing_public_key: signing.public,
            signed_devices: vec![
                device(local_device_id, &signing, true, "Primary"),
                device(other_device_id, &signing, false, "Laptop"),
            ],
            signed_one_time_public_keys: Vec::new(),
            signed_pq_kem_one_time_public_keys: Vec::new(),
        };

        let store = Arc::new(MemoryStore::default());
        // The other device is already materialized, so `refresh` never needs
        // to draw a one-time key bundle for it.
        store
            .create_session_identity(SessionIdentity {
                secret_name: "alice".into(),
                device_id: other_device_id,
                session_context_id: 7,
                long_term_public_key: generate_x25519_keypair().public,
                signing_public_key: signing.public,
                pq_kem_public_key: generate_kem_keypair().public,
                one_time_public_key: None,
                state: None,
                device_name: "Laptop".into(),
                is_master_device: false,
            })
            .await
            .unwrap();

        let transport: Arc<dyn Transport> = Arc::new(AliceOnlyTransport { configuration: configuration.clone() });
        let cache = Arc::new(Cache::new(store.clone() as Arc<dyn Store>));
        let identity_cache = Arc::new(SessionIdentityCache::new(transport.clone(), store.clone() as Arc<dyn Store>));

        let device_keys = DeviceKeys {
            signing_private_key: signing.secret.clone(),
            long_term_private_key: generate_x25519_keypair().secret,
            one_time_private_keys: Vec::new(),
            pq_kem_one_time_private_keys: Vec::new(),
            final_pq_kem_private_key: generate_kem_keypair().secret,
            rotate_keys_date: chrono::Utc::now() + chrono::Duration::days(7),
        };
        let local = Arc::new(tokio::sync::Mutex::new(LocalIdentity {
            secret_name: "alice".into(),
            device_id: local_device_id,
            long_term_public: generate_x25519_keypair().public,
            device_keys,
            configuration,
            authorizing_secret: signing.secret,
        }));

        let queue = Arc::new(JobQueue::load(store.clone() as Arc<dyn Store>).await.unwrap());
        let processor = JobProcessor::new(
            queue,
            store.clone() as Arc<dyn Store>,
            transport,
            Arc::new(NoopReceiver),
            CoreConfig::default(),
            local,
        );
        let orchestrator = Arc::new(Orchestrator::new(cache, identity_cache, processor));
        (store, orchestrator, local_device_id, other_device_id)
    }

    fn sample_message() -> CryptoMessage {
        CryptoMessage {
            message_type: MessageType("text".into()),
            flags: crate::crypto_message::MessageFlags::default(),
            payload: serde_json::Value::String("hi".into()),
        }
    }

    #[tokio::test]
    async fn broadcast_send_is_a_no_op() {
        let (store, orchestrator, local_device_id, _other) = setup().await;
        orchestrator
            .send("alice", local_device_id, sample_message(), Recipient::Broadcast)
            .await
            .unwrap();

        assert!(store.fetch_all_jobs().await.unwrap().is_empty());
        assert!(store.fetch_all_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn personal_message_fans_out_to_other_devices_and_persists_locally() {
        let (store, orchestrator, local_device_id, other_device_id) = setup().await;
        orchestrator
            .send("alice", local_device_id, sample_message(), Recipient::PersonalMessage)
            .await
            .unwrap();

        let jobs = store.fetch_all_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        let TaskType::WriteMessage(task) = &jobs[0].props.task else {
            panic!("expected a write-message job");
        };
        assert_eq!(task.recipient_identity.device_id, other_device_id);

        let messages = store.fetch_all_messages().await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn nudge_messages_are_not_persisted_locally_but_still_fan_out() {
        let (store, orchestrator, local_device_id, _other) = setup().await;
        let mut message = sample_message();
        message.flags.edit_message = true;

        orchestrator
            .send("alice", local_device_id, message, Recipient::PersonalMessage)
            .await
            .unwrap();

        assert!(store.fetch_all_messages().await.unwrap().is_empty());
        assert_eq!(store.fetch_all_jobs().await.unwrap().len(), 1);
    }

    fn sample_inbound(shared_id: &str) -> InboundTaskMessage {
        use crate::session::ratchet::message::{RatchetHeader, RatchetMessage};
        use crate::crypto::keys::{Signature, X25519PublicKey};
        InboundTaskMessage {
            signed_message: SignedRatchetMessage {
                message: RatchetMessage {
                    header: RatchetHeader {
                        dh_public: X25519PublicKey([0u8; 32]),
                        message_number: 0,
                        previous_chain_length: 0,
                        initial: None,
                    },
                    ciphertext: Vec::new(),
                },
                signature: Signature([0u8; 64]),
            },
            sender_secret_name: "bob".into(),
            sender_device_id: Uuid::new_v4(),
            shared_message_id: shared_id.to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_inbound_delivery_is_dropped() {
        let (store, orchestrator, _local, _other) = setup().await;
        let task = sample_inbound("shared-1");

        orchestrator.receive(task.clone(), false).await.unwrap();
        orchestrator.receive(task, false).await.unwrap();

        assert_eq!(store.fetch_all_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn start_session_seeds_dedup_set_from_existing_messages() {
        let (store, orchestrator, _local, _other) = setup().await;
        store
            .create_message(EncryptedMessage {
                id: Uuid::new_v4(),
                communication_id: Uuid::nil(),
                session_context_id: 0,
                shared_id: "shared-2".into(),
                sequence_number: 0,
                props: MessageProps {
                    message: sample_message(),
                    sender_secret_name: "bob".into(),
                    sender_device_id: Uuid::nil(),
                    sent_at: Utc::now(),
                    delivery_state: DeliveryState::Received,
                },
            })
            .await
            .unwrap();

        orchestrator.start_session().await.unwrap();

        let mut task = sample_inbound("shared-2");
        task.sender_device_id = Uuid::nil();
        orchestrator.receive(task, false).await.unwrap();

        assert!(store.fetch_all_jobs().await.unwrap().is_empty());
    }
}
