//! The session actor (§5): the single entry point an embedder holds,
//! wiring every other module together behind one handle.

use std::sync::Arc;

use rand::{Rng, RngCore};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cache::Cache;
use crate::collaborators::device_linking::DeviceLinkingDelegate;
use crate::collaborators::receiver::EventReceiver;
use crate::collaborators::store::Store;
use crate::collaborators::transport::{ConfigurationLookup, Transport};
use crate::config::CoreConfig;
use crate::crypto::keys::SymmetricKey;
use crate::crypto_message::{CryptoMessage, Recipient};
use crate::error::{CoreError, CoreResult};
use crate::identity::bundle::Signed;
use crate::identity::device_config::UserDeviceConfiguration;
use crate::identity::manager::IdentityManager;
use crate::jobs::model::InboundTaskMessage;
use crate::jobs::{JobProcessor, JobQueue, LocalIdentity};
use crate::orchestration::Orchestrator;
use crate::session::identity_cache::SessionIdentityCache;
use crate::session_context::{RegistrationState, SessionContext, SessionUser};
use crate::vault::SessionContextVault;

struct SessionInner {
    is_viable: bool,
    rotating_keys: bool,
}

/// The embedder's single handle onto a running crypto session. Holds the
/// decrypted root context's immutable parts directly; the mutable ones
/// (`device_keys`, `active_user_configuration`) live behind the same lock
/// the job processor's refill/rotation work already shares.
pub struct CryptoSession {
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
    config: CoreConfig,
    vault: SessionContextVault,
    cache: Arc<Cache>,
    identity_manager: IdentityManager,
    identity_cache: Arc<SessionIdentityCache>,
    device_linking: Arc<dyn DeviceLinkingDelegate>,
    queue: Arc<JobQueue>,
    processor: Arc<JobProcessor>,
    orchestrator: Arc<Orchestrator>,
    local: Arc<Mutex<LocalIdentity>>,
    database_encryption_key: SymmetricKey,
    session_context_id: i64,
    registration_state: RegistrationState,
    password: Mutex<String>,
    inner: Mutex<SessionInner>,
    executors: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl CryptoSession {
    /// Registers a brand-new account: generates a master-device bundle,
    /// publishes it, and seals the resulting context under `password`.
    pub async fn register(
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
        receiver: Arc<dyn EventReceiver>,
        device_linking: Arc<dyn DeviceLinkingDelegate>,
        config: CoreConfig,
        secret_name: String,
        password: String,
    ) -> CoreResult<Arc<Self>> {
        if let ConfigurationLookup::Exists(_) = transport.find_configuration(&secret_name).await? {
            return Err(CoreError::UserExists(secret_name));
        }

        let identity_manager = IdentityManager::new(transport.clone(), config.clone());
        let bundle = identity_manager.generate_bundle()?;
        let device_id = bundle
            .configuration
            .signed_devices
            .first()
            .expect("generate_bundle always emits the master device entry")
            .value
            .device_id;

        transport
            .publish_user_configuration(bundle.configuration.clone(), device_id)
            .await?;

        let mut database_encryption_key_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut database_encryption_key_bytes);

        let context = SessionContext {
            session_user: SessionUser {
                secret_name: secret_name.clone(),
                device_id,
                authorizing_secret: bundle.device_keys.signing_private_key.clone(),
                device_keys: bundle.device_keys,
            },
            database_encryption_key: SymmetricKey::from_bytes(database_encryption_key_bytes),
            session_context_id: rand::thread_rng().gen_range(1..i64::MAX),
            active_user_configuration: bundle.configuration,
            registration_state: RegistrationState::Registered,
        };

        let vault = SessionContextVault::new(store.clone());
        vault.seal(&password, &context).await?;

        Self::assemble(transport, store, receiver, device_linking, config, context, password).await
    }

    /// Opens an already-registered session by decrypting the persisted
    /// root context under `password`.
    pub async fn start(
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
        receiver: Arc<dyn EventReceiver>,
        device_linking: Arc<dyn DeviceLinkingDelegate>,
        config: CoreConfig,
        password: String,
    ) -> CoreResult<Arc<Self>> {
        let vault = SessionContextVault::new(store.clone());
        let context = vault.open(&password).await?;
        let session = Self::assemble(transport, store, receiver, device_linking, config, context, password).await?;
        session.orchestrator.start_session().await?;
        Ok(session)
    }

    async fn assemble(
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
        receiver: Arc<dyn EventReceiver>,
        device_linking: Arc<dyn DeviceLinkingDelegate>,
        config: CoreConfig,
        context: SessionContext,
        password: String,
    ) -> CoreResult<Arc<Self>> {
        let vault = SessionContextVault::new(store.clone());
        let cache = Arc::new(Cache::new(store.clone()));
        let identity_manager = IdentityManager::new(transport.clone(), config.clone());
        let identity_cache = Arc::new(SessionIdentityCache::new(transport.clone(), store.clone()));
        let queue = Arc::new(JobQueue::load(store.clone()).await?);

        let SessionContext {
            session_user,
            database_encryption_key,
            session_context_id,
            active_user_configuration,
            registration_state,
        } = context;
        let long_term_public = active_user_configuration
            .find_device(session_user.device_id)
            .map(|d| d.value.long_term_public_key)
            .ok_or(CoreError::InvalidDeviceIdentity)?;

        let local = Arc::new(Mutex::new(LocalIdentity {
            secret_name: session_user.secret_name,
            device_id: session_user.device_id,
            long_term_public,
            device_keys: session_user.device_keys,
            configuration: active_user_configuration,
            authorizing_secret: session_user.authorizing_secret,
        }));

        let processor = JobProcessor::new(queue.clone(), store.clone(), transport.clone(), receiver, config.clone(), local.clone());
        let orchestrator = Arc::new(Orchestrator::new(cache.clone(), identity_cache.clone(), processor.clone()));
        let executors = processor.spawn();

        Ok(Arc::new(Self {
            transport,
            store,
            config,
            vault,
            cache,
            identity_manager,
            identity_cache,
            device_linking,
            queue,
            processor,
            orchestrator,
            local,
            database_encryption_key,
            session_context_id,
            registration_state,
            password: Mutex::new(password),
            inner: Mutex::new(SessionInner {
                is_viable: true,
                rotating_keys: false,
            }),
            executors: Mutex::new(Some(executors)),
        }))
    }

    pub async fn set_viable(&self, viable: bool) {
        self.inner.lock().await.is_viable = viable;
        self.processor.set_viable(viable);
    }

    /// Sends `message` to `recipient`, refusing while a compromise rotation
    /// is in progress (§5 "rotatingKeys gates outbound fan-out").
    pub async fn send(&self, message: CryptoMessage, recipient: Recipient) -> CoreResult<String> {
        {
            let inner = self.inner.lock().await;
            if !inner.is_viable {
                return Err(CoreError::ConnectionIsNonViable);
            }
            if inner.rotating_keys {
                return Err(CoreError::ConnectionIsNonViable);
            }
        }
        let local = self.local.lock().await;
        let secret_name = local.secret_name.clone();
        let device_id = local.device_id;
        drop(local);
        self.orchestrator.send(&secret_name, device_id, message, recipient).await
    }

    pub async fn receive(&self, task: InboundTaskMessage) -> CoreResult<()> {
        self.orchestrator.receive(task, false).await
    }

    /// Handles an incoming device-linking request (§6 "device-linking
    /// delegate"): surfaces `configuration` to the embedder together with
    /// the password the requesting device presented, and on approval signs
    /// and publishes that device's entry under the account's own signing
    /// key. A `None` verdict from the delegate is a silent decline; an
    /// approved password that does not open this session's own vault is
    /// rejected even though the delegate approved it, since the delegate
    /// only attests to what the remote operator typed, not to its
    /// correctness.
    pub async fn request_device_linking(&self, configuration: UserDeviceConfiguration, password: String) -> CoreResult<()> {
        let Some(approval) = self.device_linking.request_linking(configuration.clone(), password).await else {
            return Ok(());
        };

        if !self.verify_password(&approval.password).await {
            return Err(CoreError::InvalidPassword);
        }

        let mut local = self.local.lock().await;
        let signed_device = Signed::new(configuration, &local.authorizing_secret)?;
        let device_id = signed_device.value.device_id;
        local.configuration.signed_devices.push(signed_device);
        let published_configuration = local.configuration.clone();
        drop(local);

        self.transport
            .publish_user_configuration(published_configuration, device_id)
            .await?;
        self.persist().await
    }

    /// Compromise rotation (§4.2, §5): gates outbound sends for its
    /// duration, rotates every per-device key, and re-persists the root
    /// context under the key material change.
    pub async fn rotate_on_compromise(&self) -> CoreResult<()> {
        self.inner.lock().await.rotating_keys = true;
        let result = self.rotate_on_compromise_inner().await;
        self.inner.lock().await.rotating_keys = false;
        result
    }

    async fn rotate_on_compromise_inner(&self) -> CoreResult<()> {
        let mut local = self.local.lock().await;
        let secret_name = local.secret_name.clone();
        let device_id = local.device_id;
        let authorizing_secret = local.authorizing_secret.clone();
        let LocalIdentity {
            device_keys,
            configuration,
            ..
        } = &mut *local;
        self.identity_manager
            .rotate_on_compromise(
                &secret_name,
                device_id,
                device_keys,
                configuration,
                &authorizing_secret,
            )
            .await?;
        drop(local);
        self.persist().await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> CoreResult<()> {
        self.vault.change_password(old_password, new_password).await?;
        *self.password.lock().await = new_password.to_string();
        Ok(())
    }

    pub async fn verify_password(&self, password: &str) -> bool {
        self.vault.verify_password(password).await
    }

    async fn persist(&self) -> CoreResult<()> {
        let password = self.password.lock().await.clone();
        let local = self.local.lock().await;
        let context = SessionContext {
            session_user: SessionUser {
                secret_name: local.secret_name.clone(),
                device_id: local.device_id,
                device_keys: local.device_keys.clone(),
                authorizing_secret: local.authorizing_secret.clone(),
            },
            database_encryption_key: self.database_encryption_key.clone(),
            session_context_id: self.session_context_id,
            active_user_configuration: local.configuration.clone(),
            registration_state: self.registration_state,
        };
        drop(local);
        self.vault.seal(&password, &context).await?;
        self.cache.notify_session_context_written(&context);
        Ok(())
    }

    /// Drains in-flight work by marking the processor non-viable, then
    /// stops both executors.
    pub async fn shutdown(&self) {
        self.set_viable(false).await;
        if let Some((crypto, refill)) = self.executors.lock().await.take() {
            crypto.abort();
            refill.abort();
        }
    }

}
