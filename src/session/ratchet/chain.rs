//! Symmetric chain-key ratchet (§4.4 steady state). HMAC-SHA256 over two
//! fixed context constants, in the same register as the teacher's
//! `keys::chain_key` module — message keys and the next chain key derive
//! from independent HMAC outputs so recovering one never recovers the
//! other.

use hkdf::hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::crypto::keys::SymmetricKey;

const MESSAGE_KEY_CONSTANT: &[u8] = b"msg_key";
const CHAIN_KEY_CONSTANT: &[u8] = b"ck";

#[derive(Clone, Serialize, Deserialize)]
pub struct ChainKey {
    key: SymmetricKey,
    index: u32,
}

impl std::fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainKey").field("index", &self.index).finish()
    }
}

impl ChainKey {
    pub fn new(key: SymmetricKey, index: u32) -> Self {
        Self { key, index }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the next chain key, the message key for this step, and the
    /// message number that key belongs to.
    pub fn derive_next(&self) -> (ChainKey, SymmetricKey, u32) {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(MESSAGE_KEY_CONSTANT);
        let message_key_bytes: [u8; 32] = mac.finalize().into_bytes().into();

        let mut mac_ck = Hmac::<Sha256>::new_from_slice(self.key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac_ck.update(CHAIN_KEY_CONSTANT);
        let next_key_bytes: [u8; 32] = mac_ck.finalize().into_bytes().into();

        (
            ChainKey {
                key: SymmetricKey::from_bytes(next_key_bytes),
                index: self.index + 1,
            },
            SymmetricKey::from_bytes(message_key_bytes),
            self.index,
        )
    }
}
