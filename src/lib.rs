//! A Double-Ratchet messaging core bootstrapped by a hybrid X3DH + ML-KEM
//! handshake: identity and bundle management, per-device session state,
//! a durable job queue, a password-gated context vault, an in-memory
//! cache, and the event orchestration that ties sends and deliveries to
//! all of the above.

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod crypto;
pub mod crypto_message;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod orchestration;
pub mod session;
pub mod session_actor;
pub mod session_context;
pub mod vault;

pub use config::CoreConfig;
pub use crypto_message::{CryptoMessage, MessageFlags, MessageType, Recipient};
pub use error::{CoreError, CoreResult};
pub use session_actor::CryptoSession;
pub use session_context::SessionContext;
