//! `SessionIdentity` — a ratchet endpoint for one peer device (§3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::keys::{Ed25519PublicKey, KemPublicKey, X25519PublicKey};

/// A ratchet-ready local record of one peer device. Created lazily on
/// first reference; `state` starts absent and is initialized on the first
/// encrypt (sender) or first decrypt (recipient), §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub secret_name: String,
    pub device_id: Uuid,
    /// Per-pair random id, drawn uniform in `[1, 2^63)` (§4.3 step 4).
    pub session_context_id: u64,
    pub long_term_public_key: X25519PublicKey,
    pub signing_public_key: Ed25519PublicKey,
    pub pq_kem_public_key: KemPublicKey,
    pub one_time_public_key: Option<X25519PublicKey>,
    /// Opaque, version-prefixed ratchet state blob (§4.4 "Ratchet state
    /// versioning"). `None` until the first encrypt/decrypt against this
    /// identity.
    pub state: Option<Vec<u8>>,
    pub device_name: String,
    pub is_master_device: bool,
}

impl SessionIdentity {
    pub fn has_session(&self) -> bool {
        self.state.is_some()
    }
}
