//! `RatchetState` — the opaque per-`(peer, device)` state carried inside
//! `SessionIdentity.state` (§4.4). Bootstrapping from the hybrid
//! X3DH/PQKEM handshake lives in [`super::engine`]; this module owns the
//! steady-state DH ratchet and the bounded skipped-message-key buffer.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::crypto::keys::{SymmetricKey, X25519KeyPair, X25519PublicKey};
use crate::crypto::{aead_decrypt, aead_encrypt, diffie_hellman, generate_x25519_keypair, hkdf_derive_32};
use crate::error::{CoreError, CoreResult};

use super::chain::ChainKey;

const ROOT_STEP_INFO: &[u8] = b"DoubleRatchetRootStep-v1";
const CHAIN_STEP_INFO: &[u8] = b"DoubleRatchetChainStep-v1";

/// Bounded store of message keys derived ahead of delivery order, keyed by
/// the ratchet public key in effect when they were skipped plus the
/// message number (§4.4 "Skipped-message-key bound").
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SkippedKeyStore {
    order: VecDeque<(X25519PublicKey, u32)>,
    keys: HashMap<(X25519PublicKey, u32), SymmetricKey>,
}

impl SkippedKeyStore {
    pub fn insert(&mut self, dh_public: X25519PublicKey, message_number: u32, key: SymmetricKey, bound: usize) {
        let id = (dh_public, message_number);
        if self.keys.insert(id, key).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > bound {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }

    pub fn take(&mut self, dh_public: &X25519PublicKey, message_number: u32) -> Option<SymmetricKey> {
        let id = (*dh_public, message_number);
        let key = self.keys.remove(&id)?;
        self.order.retain(|e| e != &id);
        Some(key)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RatchetState {
    root_key: SymmetricKey,
    dh_self: X25519KeyPair,
    dh_remote: Option<X25519PublicKey>,
    sending_chain: Option<ChainKey>,
    receiving_chain: Option<ChainKey>,
    previous_chain_length: u32,
    skipped: SkippedKeyStore,
}

pub struct HeaderFields {
    pub dh_public: X25519PublicKey,
    pub message_number: u32,
    pub previous_chain_length: u32,
}

impl RatchetState {
    pub fn bootstrap(
        root_key: SymmetricKey,
        dh_self: X25519KeyPair,
        dh_remote: Option<X25519PublicKey>,
        is_initiator: bool,
    ) -> CoreResult<Self> {
        let (chain_a, chain_b) = derive_initial_chains(&root_key)?;
        let (sending_chain, receiving_chain) = if is_initiator {
            (Some(chain_a), Some(chain_b))
        } else {
            (Some(chain_b), Some(chain_a))
        };
        Ok(Self {
            root_key,
            dh_self,
            dh_remote,
            sending_chain,
            receiving_chain,
            previous_chain_length: 0,
            skipped: SkippedKeyStore::default(),
        })
    }

    /// Advances the sending chain by one step and encrypts `plaintext`.
    /// Returns the header fields the caller embeds in the outbound
    /// `RatchetHeader`.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> CoreResult<(HeaderFields, Vec<u8>)> {
        let chain = self
            .sending_chain
            .as_ref()
            .ok_or(CoreError::SessionEncryptionError("sending chain not initialized".into()))?;
        let (next_chain, message_key, message_number) = chain.derive_next();
        self.sending_chain = Some(next_chain);

        let ciphertext = aead_encrypt(&message_key, plaintext)?;
        Ok((
            HeaderFields {
                dh_public: self.dh_self.public,
                message_number,
                previous_chain_length: self.previous_chain_length,
            },
            ciphertext,
        ))
    }

    /// Decrypts `ciphertext` against `header`, performing a DH ratchet
    /// step first if the header carries a new remote ratchet public key.
    pub fn decrypt(
        &mut self,
        header: &HeaderFields,
        ciphertext: &[u8],
        max_skipped_message_keys: usize,
    ) -> CoreResult<Vec<u8>> {
        if let Some(key) = self.skipped.take(&header.dh_public, header.message_number) {
            return aead_decrypt(&key, ciphertext).map_err(Into::into);
        }

        let is_new_remote = self.dh_remote.map(|r| r != header.dh_public).unwrap_or(true);
        if is_new_remote {
            self.skip_receiving_keys(header.previous_chain_length, max_skipped_message_keys)?;
            self.dh_ratchet(header.dh_public)?;
        }

        self.skip_receiving_keys(header.message_number, max_skipped_message_keys)?;

        let chain = self
            .receiving_chain
            .as_ref()
            .ok_or(CoreError::SessionDecryptionError("receiving chain not initialized".into()))?;
        let (next_chain, message_key, message_number) = chain.derive_next();
        if message_number != header.message_number {
            return Err(CoreError::InvalidSignature);
        }
        self.receiving_chain = Some(next_chain);

        aead_decrypt(&message_key, ciphertext).map_err(Into::into)
    }

    fn skip_receiving_keys(&mut self, until: u32, bound: usize) -> CoreResult<()> {
        let Some(mut chain) = self.receiving_chain.clone() else {
            return Ok(());
        };
        while chain.index() < until {
            let (next_chain, message_key, message_number) = chain.derive_next();
            self.skipped.insert(self.dh_remote.ok_or_else(missing_remote)?, message_number, message_key, bound);
            chain = next_chain;
        }
        self.receiving_chain = Some(chain);
        Ok(())
    }

    fn dh_ratchet(&mut self, new_remote: X25519PublicKey) -> CoreResult<()> {
        self.previous_chain_length = self.sending_chain.as_ref().map(|c| c.index()).unwrap_or(0);
        self.dh_remote = Some(new_remote);

        let dh_recv = diffie_hellman(&self.dh_self.secret, &new_remote);
        let (root_after_recv, recv_seed) = step_root(&self.root_key, &dh_recv)?;
        self.root_key = root_after_recv;
        self.receiving_chain = Some(ChainKey::new(recv_seed, 0));

        self.dh_self = generate_x25519_keypair();
        let dh_send = diffie_hellman(&self.dh_self.secret, &new_remote);
        let (root_after_send, send_seed) = step_root(&self.root_key, &dh_send)?;
        self.root_key = root_after_send;
        self.sending_chain = Some(ChainKey::new(send_seed, 0));

        Ok(())
    }
}

fn missing_remote() -> CoreError {
    CoreError::SessionDecryptionError("no remote ratchet key established yet".into())
}

/// One DH-ratchet KDF step: derives a fresh root key and a chain seed from
/// the previous root (as HKDF salt) and a new DH output (as IKM).
fn step_root(root_key: &SymmetricKey, dh_output: &SymmetricKey) -> CoreResult<(SymmetricKey, SymmetricKey)> {
    let new_root = hkdf_derive_32(root_key.as_bytes(), dh_output.as_bytes(), ROOT_STEP_INFO)?;
    let chain_seed = hkdf_derive_32(root_key.as_bytes(), dh_output.as_bytes(), CHAIN_STEP_INFO)?;
    Ok((new_root, chain_seed))
}

/// Splits the X3DH/PQKEM root key into two independent chain seeds, one
/// per direction — mirrors the teacher's
/// `crypto_utils::hkdf::derive_initial_chain_keys` split, generalized to
/// the hybrid root.
fn derive_initial_chains(root_key: &SymmetricKey) -> CoreResult<(ChainKey, ChainKey)> {
    let seed_a = hkdf_derive_32(&[], root_key.as_bytes(), b"InitialChainA-v1")?;
    let seed_b = hkdf_derive_32(&[], root_key.as_bytes(), b"InitialChainB-v1")?;
    Ok((ChainKey::new(seed_a, 0), ChainKey::new(seed_b, 0)))
}
