//! Durable job deque (§4.5). Sequence ids are strictly monotonic so that
//! per-`(peer, device)` ratchet operations execute in enqueue order; the
//! deque itself is an ordered sequence, not a set — two jobs may target the
//! same pair and both stay queued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::collaborators::store::Store;
use crate::error::CoreResult;

use super::model::{JobModel, TaskType};

pub struct JobQueue {
    store: Arc<dyn Store>,
    deque: Mutex<VecDeque<JobModel>>,
    next_sequence_id: AtomicU64,
}

impl JobQueue {
    /// Rehydrates the in-memory deque from the store in ascending
    /// `sequenceId` order (§9 "insertion-sorted in-memory job deque").
    pub async fn load(store: Arc<dyn Store>) -> CoreResult<Self> {
        let mut jobs = store.fetch_all_jobs().await?;
        jobs.sort();
        let next_sequence_id = jobs
            .last()
            .map(|j| j.props.sequence_id + 1)
            .unwrap_or(0);
        Ok(Self {
            store,
            deque: Mutex::new(VecDeque::from(jobs)),
            next_sequence_id: AtomicU64::new(next_sequence_id),
        })
    }

    pub async fn enqueue(&self, task: TaskType, is_background_task: bool) -> CoreResult<JobModel> {
        let sequence_id = self.next_sequence_id.fetch_add(1, Ordering::SeqCst);
        let job = JobModel::new(sequence_id, task, is_background_task);
        self.store.create_job(job.clone()).await?;
        self.insert_sorted(job.clone()).await;
        Ok(job)
    }

    /// Removes and returns the lowest-`sequenceId` job, if any.
    pub async fn pop_front(&self) -> Option<JobModel> {
        self.deque.lock().await.pop_front()
    }

    /// Re-inserts a job (e.g. after a viability stall or a retry), keeping
    /// ascending `sequenceId` order.
    pub async fn reinsert(&self, job: JobModel) {
        self.insert_sorted(job).await;
    }

    pub async fn complete(&self, job: &JobModel) -> CoreResult<()> {
        self.store.delete_job(job.id).await
    }

    pub async fn persist_retry(&self, job: &JobModel) -> CoreResult<()> {
        self.store.create_job(job.clone()).await
    }

    async fn insert_sorted(&self, job: JobModel) {
        let mut deque = self.deque.lock().await;
        let position = deque
            .iter()
            .position(|existing| existing.props.sequence_id > job.props.sequence_id)
            .unwrap_or(deque.len());
        deque.insert(position, job);
    }

    pub async fn is_empty(&self) -> bool {
        self.deque.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::InboundTaskMessage;
    use crate::session::ratchet::message::{RatchetHeader, RatchetMessage, SignedRatchetMessage};
    use crate::crypto::keys::{Signature, X25519PublicKey};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MemoryStore {
        jobs: StdMutex<Vec<JobModel>>,
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
        async fn create_session_identity(&self, _identity: crate::session::identity::SessionIdentity) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_session_identities(&self) -> CoreResult<Vec<crate::session::identity::SessionIdentity>> {
            Ok(Vec::new())
        }
        async fn update_session_identity(&self, _identity: crate::session::identity::SessionIdentity) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_session_identity(&self, _secret_name: &str, _device_id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_message(&self, _message: crate::cache::entities::EncryptedMessage) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_message_by_id(&self, _id: Uuid) -> CoreResult<Option<crate::cache::entities::EncryptedMessage>> {
            Ok(None)
        }
        async fn fetch_message_by_shared_id(&self, _shared_id: &str) -> CoreResult<Option<crate::cache::entities::EncryptedMessage>> {
            Ok(None)
        }
        async fn fetch_all_messages(&self) -> CoreResult<Vec<crate::cache::entities::EncryptedMessage>> {
            Ok(Vec::new())
        }
        async fn update_message(&self, _message: crate::cache::entities::EncryptedMessage) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_message(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_communication(&self, _communication: crate::cache::entities::BaseCommunication) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_communications(&self) -> CoreResult<Vec<crate::cache::entities::BaseCommunication>> {
            Ok(Vec::new())
        }
        async fn update_communication(&self, _communication: crate::cache::entities::BaseCommunication) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_communication(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_contact(&self, _contact: crate::cache::entities::ContactModel) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_all_contacts(&self) -> CoreResult<Vec<crate::cache::entities::ContactModel>> {
            Ok(Vec::new())
        }
        async fn update_contact(&self, _contact: crate::cache::entities::ContactModel) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_contact(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_job(&self, job: JobModel) -> CoreResult<()> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
        async fn fetch_all_jobs(&self) -> CoreResult<Vec<JobModel>> {
            Ok(self.jobs.lock().unwrap().clone())
        }
        async fn delete_job(&self, id: Uuid) -> CoreResult<()> {
            self.jobs.lock().unwrap().retain(|j| j.id != id);
            Ok(())
        }
        async fn create_data_packet(&self, _packet: crate::cache::entities::DataPacket) -> CoreResult<()> {
            Ok(())
        }
        async fn fetch_data_packet(&self, _id: Uuid) -> CoreResult<Option<crate::cache::entities::DataPacket>> {
            Ok(None)
        }
        async fn delete_data_packet(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
        async fn create_media_job(&self, _job: crate::cache::entities::MediaJob) -> CoreResult<()> {
            Ok(())
        }
        async fn delete_media_job(&self, _id: Uuid) -> CoreResult<()> {
            Ok(())
        }
    }

    fn sample_inbound_task() -> TaskType {
        TaskType::StreamMessage(InboundTaskMessage {
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
            shared_message_id: "shared-1".into(),
        })
    }

    #[tokio::test]
    async fn enqueue_preserves_ascending_sequence_order() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let queue = JobQueue::load(store).await.unwrap();

        let first = queue.enqueue(sample_inbound_task(), false).await.unwrap();
        let second = queue.enqueue(sample_inbound_task(), false).await.unwrap();
        assert!(first.props.sequence_id < second.props.sequence_id);

        let popped_first = queue.pop_front().await.unwrap();
        assert_eq!(popped_first.id, first.id);
        let popped_second = queue.pop_front().await.unwrap();
        assert_eq!(popped_second.id, second.id);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn reinsert_keeps_sequence_order() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let queue = JobQueue::load(store).await.unwrap();

        let first = queue.enqueue(sample_inbound_task(), false).await.unwrap();
        let second = queue.enqueue(sample_inbound_task(), false).await.unwrap();
        let popped = queue.pop_front().await.unwrap();
        assert_eq!(popped.id, first.id);
        queue.reinsert(popped.clone()).await;

        let head = queue.pop_front().await.unwrap();
        assert_eq!(head.id, first.id);
        let tail = queue.pop_front().await.unwrap();
        assert_eq!(tail.id, second.id);
    }
}
