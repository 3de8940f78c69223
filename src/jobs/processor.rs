//! Execution loop for the job queue (§4.5). Two dedicated executors: one
//! drains the ratchet work itself, the other handles key-transport refill
//! commands, so a slow key-publish call never stalls message encryption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cache::entities::{DeliveryState, EncryptedMessage, MessageProps};
use crate::collaborators::receiver::EventReceiver;
use crate::collaborators::store::Store;
use crate::collaborators::transport::{OneTimeKeyFlavor, SendEnvelope, Transport};
use crate::config::CoreConfig;
use crate::crypto::keys::{Ed25519SecretKey, X25519PublicKey};
use crate::error::CoreResult;
use crate::identity::bundle::UserConfiguration;
use crate::identity::device_keys::DeviceKeys;
use crate::identity::manager::IdentityManager;
use crate::session::ratchet;

use super::model::{InboundTaskMessage, JobModel, OutboundTaskMessage, TaskType};
use super::queue::JobQueue;

/// Work item handed to the key-transport executor (§4.5 "Isolation").
#[derive(Debug, Clone, Copy)]
pub enum RefillCommand {
    Curve,
    Kyber,
}

/// The locally owned identity state the ratchet dispatch needs on every
/// operation. Lives behind a single lock shared with the session actor so
/// key material is never cloned out of the session's control.
pub struct LocalIdentity {
    pub secret_name: String,
    pub device_id: Uuid,
    pub long_term_public: X25519PublicKey,
    pub device_keys: DeviceKeys,
    pub configuration: UserConfiguration,
    /// The account's single signing secret (§4.2): equals
    /// `device_keys.signing_private_key` on the master device, distinct on a
    /// child device, which received it from the master at linking time so it
    /// can re-sign its own refilled and rotated bundle entries.
    pub authorizing_secret: Ed25519SecretKey,
}

pub struct JobProcessor {
    queue: Arc<JobQueue>,
    store: Arc<dyn Store>,
    transport: Arc<dyn Transport>,
    receiver: Arc<dyn EventReceiver>,
    identity_manager: IdentityManager,
    config: CoreConfig,
    local: Arc<Mutex<LocalIdentity>>,
    viable: Arc<AtomicBool>,
    wake_crypto: mpsc::UnboundedSender<()>,
    wake_crypto_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    refill_tx: mpsc::UnboundedSender<RefillCommand>,
    refill_rx: Mutex<Option<mpsc::UnboundedReceiver<RefillCommand>>>,
}

impl JobProcessor {
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
        receiver: Arc<dyn EventReceiver>,
        config: CoreConfig,
        local: Arc<Mutex<LocalIdentity>>,
    ) -> Arc<Self> {
        let (wake_crypto, wake_crypto_rx) = mpsc::unbounded_channel();
        let (refill_tx, refill_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            queue,
            identity_manager: IdentityManager::new(transport.clone(), config.clone()),
            store,
            transport,
            receiver,
            config,
            local,
            viable: Arc::new(AtomicBool::new(true)),
            wake_crypto,
            wake_crypto_rx: Mutex::new(Some(wake_crypto_rx)),
            refill_tx,
            refill_rx: Mutex::new(Some(refill_rx)),
        })
    }

    pub fn set_viable(&self, viable: bool) {
        self.viable.store(viable, Ordering::SeqCst);
        if viable {
            let _ = self.wake_crypto.send(());
        }
    }

    pub async fn enqueue_outbound(&self, task: OutboundTaskMessage, is_background: bool) -> CoreResult<JobModel> {
        let job = self.queue.enqueue(TaskType::WriteMessage(task), is_background).await?;
        let _ = self.wake_crypto.send(());
        Ok(job)
    }

    pub async fn enqueue_inbound(&self, task: InboundTaskMessage, is_background: bool) -> CoreResult<JobModel> {
        let job = self.queue.enqueue(TaskType::StreamMessage(task), is_background).await?;
        let _ = self.wake_crypto.send(());
        Ok(job)
    }

    pub fn request_refill(&self, flavor: OneTimeKeyFlavor) {
        let command = match flavor {
            OneTimeKeyFlavor::Curve => RefillCommand::Curve,
            OneTimeKeyFlavor::Kyber => RefillCommand::Kyber,
        };
        let _ = self.refill_tx.send(command);
    }

    /// Spawns the two executors (§5 "two independent single-consumer
    /// loops"). Call once per session lifetime; `shutdown` aborts both.
    pub fn spawn(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let crypto_loop = {
            let processor = self.clone();
            let rx = processor
                .wake_crypto_rx
                .try_lock()
                .expect("spawn called once")
                .take()
                .expect("crypto executor already spawned");
            tokio::spawn(async move { processor.run_crypto_executor(rx).await })
        };
        let refill_loop = {
            let processor = self.clone();
            let rx = processor
                .refill_rx
                .try_lock()
                .expect("spawn called once")
                .take()
                .expect("refill executor already spawned");
            tokio::spawn(async move { processor.run_refill_executor(rx).await })
        };
        (crypto_loop, refill_loop)
    }

    async fn run_crypto_executor(self: Arc<Self>, mut wake: mpsc::UnboundedReceiver<()>) {
        loop {
            if wake.recv().await.is_none() {
                return;
            }
            loop {
                if !self.viable.load(Ordering::SeqCst) {
                    break;
                }
                let Some(job) = self.queue.pop_front().await else {
                    break;
                };
                self.drain_one(job).await;
            }
        }
    }

    async fn drain_one(&self, mut job: JobModel) {
        if let Some(delayed_until) = job.props.delayed_until {
            if delayed_until > Utc::now() {
                self.queue.reinsert(job).await;
                return;
            }
        }

        let result = match &job.props.task {
            TaskType::WriteMessage(task) => self.process_outbound(task).await,
            TaskType::StreamMessage(task) => self.process_inbound(task).await,
        };

        match result {
            Ok(()) => {
                if let Err(error) = self.queue.complete(&job).await {
                    tracing::error!(%error, job_id = %job.id, "failed to delete completed job");
                }
            }
            Err(error) => {
                job.props.attempts += 1;
                if job.props.attempts >= self.config.job_retry_max_attempts {
                    tracing::error!(%error, job_id = %job.id, attempts = job.props.attempts, "dropping job after exhausting retries");
                    if let TaskType::StreamMessage(task) = &job.props.task {
                        self.notify_inbound_failure(task).await;
                    }
                    if let Err(delete_error) = self.queue.complete(&job).await {
                        tracing::error!(%delete_error, job_id = %job.id, "failed to delete dropped job");
                    }
                    return;
                }

                tracing::warn!(%error, job_id = %job.id, attempts = job.props.attempts, "job failed, scheduling retry");
                let backoff = retry_backoff(&self.config, job.props.attempts);
                job.props.delayed_until = Some(Utc::now() + backoff);
                if let Err(persist_error) = self.queue.persist_retry(&job).await {
                    tracing::error!(%persist_error, job_id = %job.id, "failed to persist retry");
                }
                self.queue.reinsert(job).await;
            }
        }
    }

    async fn process_outbound(&self, task: &OutboundTaskMessage) -> CoreResult<()> {
        let local = self.local.lock().await;
        let mut identity = self.current_identity(&task.recipient_identity.secret_name, task.recipient_identity.device_id, &task.recipient_identity).await?;

        let one_time_bundle = if identity.state.is_none() {
            Some(
                self.transport
                    .fetch_one_time_keys(&identity.secret_name, identity.device_id)
                    .await?,
            )
        } else {
            None
        };

        let plaintext = serde_json::to_vec(&task.message)?;
        let outbound = ratchet::encrypt(
            &local.device_keys,
            &local.long_term_public,
            &local.secret_name,
            &identity.secret_name,
            &identity,
            identity.state.as_deref(),
            one_time_bundle.as_ref(),
            &plaintext,
        )?;
        drop(local);

        identity.state = Some(outbound.state_blob);
        self.store.update_session_identity(identity.clone()).await?;

        if let Some(consumed) = outbound.consumed_one_time_keys {
            self.transport
                .notify_identity_creation(&identity.secret_name, identity.device_id, consumed)
                .await?;
        }

        self.transport
            .send_message(
                outbound.signed_message,
                SendEnvelope {
                    secret_name: identity.secret_name.clone(),
                    device_id: identity.device_id,
                    push_type: task.push_type.clone(),
                    shared_message_identifier: task.shared_id.clone(),
                    message_type: task.message.message_type.clone(),
                    message_flags: task.message.flags.clone(),
                    recipient: task.recipient.clone(),
                },
            )
            .await?;

        Ok(())
    }

    async fn process_inbound(&self, task: &InboundTaskMessage) -> CoreResult<()> {
        if self
            .store
            .fetch_message_by_shared_id(&task.shared_message_id)
            .await?
            .is_some()
        {
            tracing::debug!(shared_id = %task.shared_message_id, "duplicate inbound message, dropping after state advancement");
            return Ok(());
        }

        let mut local = self.local.lock().await;
        let mut identity = self.require_identity(&task.sender_secret_name, task.sender_device_id).await?;

        let long_term_public = local.long_term_public;
        let local_secret_name = local.secret_name.clone();
        let (plaintext, state_blob) = ratchet::decrypt(
            &mut local.device_keys,
            &long_term_public,
            &local_secret_name,
            &identity.secret_name,
            &identity.signing_public_key,
            identity.state.as_deref(),
            &task.signed_message,
            self.config.max_skipped_message_keys,
        )?;

        identity.state = Some(state_blob);
        self.store.update_session_identity(identity.clone()).await?;

        let message: crate::crypto_message::CryptoMessage = serde_json::from_slice(&plaintext)?;
        if !message.flags.is_nudge() {
            let record = EncryptedMessage {
                id: Uuid::new_v4(),
                communication_id: Uuid::nil(),
                session_context_id: identity.session_context_id as i64,
                shared_id: task.shared_message_id.clone(),
                sequence_number: 0,
                props: MessageProps {
                    message,
                    sender_secret_name: task.sender_secret_name.clone(),
                    sender_device_id: task.sender_device_id,
                    sent_at: Utc::now(),
                    delivery_state: DeliveryState::Received,
                },
            };
            self.store.create_message(record.clone()).await?;
            self.receiver.created_message(record).await;
        }

        Ok(())
    }

    async fn notify_inbound_failure(&self, task: &InboundTaskMessage) {
        if let Ok(Some(mut message)) = self.store.fetch_message_by_shared_id(&task.shared_message_id).await {
            message.props.delivery_state = DeliveryState::Failed;
            if self.store.update_message(message.clone()).await.is_ok() {
                self.receiver.updated_message(message).await;
            }
        }
    }

    /// Looks up the current persisted identity for `(secret_name,
    /// device_id)`, falling back to `seed` (the snapshot taken at enqueue
    /// time) when no row exists yet.
    async fn current_identity(
        &self,
        secret_name: &str,
        device_id: Uuid,
        seed: &crate::session::identity::SessionIdentity,
    ) -> CoreResult<crate::session::identity::SessionIdentity> {
        let identities = self.store.fetch_all_session_identities().await?;
        Ok(identities
            .into_iter()
            .find(|identity| identity.secret_name == secret_name && identity.device_id == device_id)
            .unwrap_or_else(|| seed.clone()))
    }

    /// The sender must already have a cached [`SessionIdentity`] row — the
    /// session identity cache (§4.3) is responsible for materializing one
    /// before a decrypt is ever attempted against a device.
    async fn require_identity(
        &self,
        secret_name: &str,
        device_id: Uuid,
    ) -> CoreResult<crate::session::identity::SessionIdentity> {
        self.store
            .fetch_all_session_identities()
            .await?
            .into_iter()
            .find(|identity| identity.secret_name == secret_name && identity.device_id == device_id)
            .ok_or_else(|| crate::error::CoreError::MissingSessionIdentity {
                secret_name: secret_name.to_string(),
                device_id,
            })
    }

    async fn run_refill_executor(self: Arc<Self>, mut commands: mpsc::UnboundedReceiver<RefillCommand>) {
        while let Some(command) = commands.recv().await {
            let mut local = self.local.lock().await;
            let secret_name = local.secret_name.clone();
            let device_id = local.device_id;
            let LocalIdentity {
                ref mut device_keys,
                ref mut configuration,
                ref authorizing_secret,
                ..
            } = *local;

            let result = match command {
                RefillCommand::Curve => {
                    self.identity_manager
                        .refill_curve_one_time_keys(&secret_name, device_id, device_keys, configuration, authorizing_secret)
                        .await
                }
                RefillCommand::Kyber => {
                    self.identity_manager
                        .refill_kyber_one_time_keys(&secret_name, device_id, device_keys, configuration, authorizing_secret)
                        .await
                }
            };
            if let Err(error) = result {
                tracing::error!(%error, ?command, "one-time key refill failed");
            }
        }
    }
}

fn retry_backoff(config: &CoreConfig, attempts: u32) -> chrono::Duration {
    let exponent = attempts.saturating_sub(1).min(20);
    let scaled = config.job_retry_base_backoff.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
    let capped = scaled.min(config.job_retry_max_backoff);
    chrono::Duration::from_std(capped).unwrap_or_else(|_| chrono::Duration::seconds(1))
}
