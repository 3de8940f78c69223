//! Ratchet Engine (§4.4): hybrid X3DH/PQKEM bootstrap plus the versioned
//! persistence of [`RatchetState`]. Everything here is synchronous and
//! pure given its inputs — the job processor is what serializes calls
//! through the crypto executor (§5).

use crate::collaborators::transport::OneTimeKeyBundle;
use crate::collaborators::transport::ConsumedOneTimeKeys;
use crate::crypto::keys::{Ed25519PublicKey, X25519KeyPair, X25519PublicKey};
use crate::crypto::{diffie_hellman, generate_x25519_keypair, hkdf_derive_32, kem_decapsulate, kem_encapsulate, sha512, sign, verify};
use crate::error::{CoreError, CoreResult};
use crate::identity::device_keys::DeviceKeys;
use crate::session::identity::SessionIdentity;

use super::message::{InitialHeader, RatchetHeader, RatchetMessage, SignedRatchetMessage};
use super::state::{HeaderFields, RatchetState};

/// Binds the root key derivation to this protocol version, distinct from
/// the vault's password-KDF info string (§4.2 expansion note).
const ROOT_BINDING_INFO: &[u8] = b"X3DHTemporaryReplacement";

pub const RATCHET_STATE_VERSION: u8 = 1;

pub fn serialize_state(state: &RatchetState) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(257);
    out.push(RATCHET_STATE_VERSION);
    out.extend(bincode::serialize(state)?);
    Ok(out)
}

pub fn deserialize_state(blob: &[u8]) -> CoreResult<RatchetState> {
    let (version, body) = blob
        .split_first()
        .ok_or_else(|| CoreError::ConfigurationError("empty ratchet state blob".into()))?;
    match *version {
        RATCHET_STATE_VERSION => Ok(bincode::deserialize(body)?),
        other => Err(CoreError::ConfigurationError(format!(
            "unrecognized ratchet state version {other}"
        ))),
    }
}

pub struct OutboundResult {
    pub signed_message: SignedRatchetMessage,
    pub state_blob: Vec<u8>,
    pub consumed_one_time_keys: Option<ConsumedOneTimeKeys>,
}

/// Encrypts `plaintext` for `recipient`. `existing_state` is `None` on the
/// very first message to this device, in which case `one_time_bundle`
/// (freshly fetched by the session identity cache) seeds the handshake.
pub fn encrypt(
    local_device_keys: &DeviceKeys,
    local_long_term_public: &X25519PublicKey,
    local_secret_name: &str,
    peer_secret_name: &str,
    recipient: &SessionIdentity,
    existing_state: Option<&[u8]>,
    one_time_bundle: Option<&OneTimeKeyBundle>,
    plaintext: &[u8],
) -> CoreResult<OutboundResult> {
    let (mut state, initial_header, consumed_one_time_keys) = match existing_state {
        Some(blob) => (deserialize_state(blob)?, None, None),
        None => {
            let (state, header, consumed) = initialize_sender(
                local_device_keys,
                local_long_term_public,
                local_secret_name,
                peer_secret_name,
                recipient,
                one_time_bundle,
            )?;
            (state, Some(header), Some(consumed))
        }
    };

    let (header_fields, ciphertext) = state.encrypt(plaintext)?;
    let header = RatchetHeader {
        dh_public: header_fields.dh_public,
        message_number: header_fields.message_number,
        previous_chain_length: header_fields.previous_chain_length,
        initial: initial_header,
    };
    let message = RatchetMessage { header, ciphertext };
    let signature = sign(&local_device_keys.signing_private_key, &message.ciphertext);

    Ok(OutboundResult {
        signed_message: SignedRatchetMessage { message, signature },
        state_blob: serialize_state(&state)?,
        consumed_one_time_keys,
    })
}

/// Verifies and decrypts `signed_message`. `existing_state` is `None` on
/// the first inbound message from this device, in which case the header's
/// `initial` field must be present to bootstrap the recipient side.
pub fn decrypt(
    local_device_keys: &mut DeviceKeys,
    local_long_term_public: &X25519PublicKey,
    local_secret_name: &str,
    peer_secret_name: &str,
    sender_signing_public: &Ed25519PublicKey,
    existing_state: Option<&[u8]>,
    signed_message: &SignedRatchetMessage,
    max_skipped_message_keys: usize,
) -> CoreResult<(Vec<u8>, Vec<u8>)> {
    verify(
        sender_signing_public,
        &signed_message.message.ciphertext,
        &signed_message.signature,
    )
    .map_err(|_| CoreError::InvalidSignature)?;

    let mut state = match existing_state {
        Some(blob) => deserialize_state(blob)?,
        None => initialize_recipient(
            local_device_keys,
            local_long_term_public,
            local_secret_name,
            peer_secret_name,
            &signed_message.message.header,
        )?,
    };

    let header = &signed_message.message.header;
    let header_fields = HeaderFields {
        dh_public: header.dh_public,
        message_number: header.message_number,
        previous_chain_length: header.previous_chain_length,
    };

    let plaintext = state.decrypt(&header_fields, &signed_message.message.ciphertext, max_skipped_message_keys)?;
    let state_blob = serialize_state(&state)?;
    Ok((plaintext, state_blob))
}

/// §4.4 "Sender initialization": extended triple-DH plus ML-KEM
/// encapsulation against the recipient's reserve key, or a fetched
/// one-time key when the bundle carries one.
fn initialize_sender(
    local_device_keys: &DeviceKeys,
    local_long_term_public: &X25519PublicKey,
    local_secret_name: &str,
    peer_secret_name: &str,
    recipient: &SessionIdentity,
    one_time_bundle: Option<&OneTimeKeyBundle>,
) -> CoreResult<(RatchetState, InitialHeader, ConsumedOneTimeKeys)> {
    let ephemeral = generate_x25519_keypair();

    let curve_one_time = one_time_bundle.and_then(|b| b.curve.as_ref());
    let kyber_one_time = one_time_bundle.and_then(|b| b.kyber.as_ref());

    let dh1 = diffie_hellman(&local_device_keys.long_term_private_key, &recipient.long_term_public_key);
    let dh2 = curve_one_time
        .map(|otk| diffie_hellman(&local_device_keys.long_term_private_key, &otk.public));
    let dh3 = diffie_hellman(&ephemeral.secret, &recipient.long_term_public_key);

    let kem_target_public = kyber_one_time
        .map(|k| &k.public)
        .unwrap_or(&recipient.pq_kem_public_key);
    let (kem_ciphertext, kem_shared) = kem_encapsulate(kem_target_public)?;

    let root_key = derive_root_key(local_secret_name, peer_secret_name, &dh1, dh2.as_ref(), &dh3, &kem_shared)?;

    let state = RatchetState::bootstrap(
        root_key,
        ephemeral.clone(),
        Some(recipient.long_term_public_key),
        true,
    )?;

    let initial_header = InitialHeader {
        sender_identity_public: *local_long_term_public,
        sender_ephemeral_public: ephemeral.public,
        kem_ciphertext,
        one_time_key_id: curve_one_time.map(|k| k.id),
        kem_one_time_key_id: kyber_one_time.map(|k| k.id),
    };
    let consumed = ConsumedOneTimeKeys {
        curve_id: curve_one_time.map(|k| k.id),
        kyber_id: kyber_one_time.map(|k| k.id),
    };

    Ok((state, initial_header, consumed))
}

/// §4.4 "Recipient initialization": the mirror of [`initialize_sender`],
/// consuming whichever local one-time private keys the header identifies.
fn initialize_recipient(
    local_device_keys: &mut DeviceKeys,
    local_long_term_public: &X25519PublicKey,
    local_secret_name: &str,
    peer_secret_name: &str,
    header: &RatchetHeader,
) -> CoreResult<RatchetState> {
    let initial = header
        .initial
        .as_ref()
        .ok_or_else(|| CoreError::SessionDecryptionError("first message is missing its initial header".into()))?;

    let dh1 = diffie_hellman(&local_device_keys.long_term_private_key, &initial.sender_identity_public);
    let dh2 = match initial.one_time_key_id {
        Some(id) => {
            let secret = local_device_keys
                .take_one_time_x25519(id)
                .ok_or(CoreError::CannotFindOneTimeKey)?;
            Some(diffie_hellman(&secret, &initial.sender_identity_public))
        }
        None => None,
    };
    let dh3 = diffie_hellman(&local_device_keys.long_term_private_key, &initial.sender_ephemeral_public);

    let kem_secret = match initial.kem_one_time_key_id {
        Some(id) => local_device_keys
            .take_one_time_kem(id)
            .ok_or(CoreError::CannotFindOneTimeKey)?,
        None => local_device_keys.final_pq_kem_private_key.clone(),
    };
    let kem_shared = kem_decapsulate(&kem_secret, &initial.kem_ciphertext)?;

    let root_key = derive_root_key(local_secret_name, peer_secret_name, &dh1, dh2.as_ref(), &dh3, &kem_shared)?;

    let local_identity_keypair = X25519KeyPair {
        secret: local_device_keys.long_term_private_key.clone(),
        public: *local_long_term_public,
    };

    RatchetState::bootstrap(
        root_key,
        local_identity_keypair,
        Some(initial.sender_ephemeral_public),
        false,
    )
}

/// Salts the root key with both parties' secret names in a fixed,
/// lexicographic order so sender and recipient (who each call this with
/// "my name" and "their name" swapped) land on the same salt.
fn canonical_pair_salt(local_secret_name: &str, peer_secret_name: &str) -> [u8; 64] {
    let mut pair = [local_secret_name, peer_secret_name];
    pair.sort_unstable();
    let mut joined = Vec::with_capacity(pair[0].len() + pair[1].len() + 1);
    joined.extend_from_slice(pair[0].as_bytes());
    joined.push(0);
    joined.extend_from_slice(pair[1].as_bytes());
    sha512(&joined)
}

fn derive_root_key(
    local_secret_name: &str,
    peer_secret_name: &str,
    dh1: &crate::crypto::keys::SymmetricKey,
    dh2: Option<&crate::crypto::keys::SymmetricKey>,
    dh3: &crate::crypto::keys::SymmetricKey,
    kem_shared: &crate::crypto::keys::SymmetricKey,
) -> CoreResult<crate::crypto::keys::SymmetricKey> {
    let mut ikm = Vec::with_capacity(4 * 32);
    ikm.extend_from_slice(dh1.as_bytes());
    if let Some(dh2) = dh2 {
        ikm.extend_from_slice(dh2.as_bytes());
    }
    ikm.extend_from_slice(dh3.as_bytes());
    ikm.extend_from_slice(kem_shared.as_bytes());

    let salt = canonical_pair_salt(local_secret_name, peer_secret_name);
    hkdf_derive_32(&salt, &ikm, ROOT_BINDING_INFO).map_err(Into::into)
}
