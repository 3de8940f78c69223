//! Session layer (§4.3, §4.4): per-device identity records, the cache that
//! discovers and maintains them, and the Double-Ratchet engine that reads
//! and writes their opaque `state` blob.

pub mod identity;
pub mod identity_cache;
pub mod ratchet;

pub use identity::SessionIdentity;
pub use identity_cache::SessionIdentityCache;
