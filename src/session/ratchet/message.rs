//! Wire-shaped ratchet message types: the header carried on every
//! ciphertext, and the signature envelope wrapped around it (§4.4).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::keys::{KemCiphertext, Signature, X25519PublicKey};

/// Present only on the first message of a session — carries everything
/// the recipient needs to run recipient-side X3DH/PQKEM initialization
/// (§4.4 "Recipient initialization").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialHeader {
    pub sender_identity_public: X25519PublicKey,
    pub sender_ephemeral_public: X25519PublicKey,
    pub kem_ciphertext: KemCiphertext,
    pub one_time_key_id: Option<Uuid>,
    pub kem_one_time_key_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatchetHeader {
    /// The sender's current DH ratchet public key.
    pub dh_public: X25519PublicKey,
    /// Index within the sender's current sending chain.
    pub message_number: u32,
    /// Length of the previous sending chain, so the recipient knows how
    /// many trailing skipped keys to derive from it after a DH ratchet.
    pub previous_chain_length: u32,
    pub initial: Option<InitialHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatchetMessage {
    pub header: RatchetHeader,
    /// AEAD output (nonce prepended, see [`crate::crypto::aead_encrypt`]).
    pub ciphertext: Vec<u8>,
}

/// Every outbound ciphertext is wrapped in this envelope (§4.4). The
/// signature covers `message.ciphertext` only, per the spec's exact
/// wording — header tampering does not invalidate it, the ratchet's own
/// MAC-then-decrypt step is what rejects a mismatched header instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRatchetMessage {
    pub message: RatchetMessage,
    pub signature: Signature,
}
