//! External collaborators (§6) — delegate traits the core consumes but
//! never implements. The embedder constructs concrete implementations and
//! hands them to [`crate::session::CryptoSession::create`], in the
//! register of `aura-core`'s effect-trait modules (`effects/network.rs`,
//! `effects/journal.rs`): a capability interface defined here, implemented
//! elsewhere.

pub mod device_linking;
pub mod receiver;
pub mod store;
pub mod transport;

pub use device_linking::DeviceLinkingDelegate;
pub use receiver::EventReceiver;
pub use store::Store;
pub use transport::Transport;
