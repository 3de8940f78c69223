//! AEAD over a 256-bit symmetric key, ChaCha20-Poly1305.
//!
//! The nonce is generated fresh per call and prepended to the returned
//! blob so callers hold a single opaque ciphertext, matching the spec's
//! "authenticated with implicit nonce + tag" contract.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};

use super::CryptoError;
use super::keys::SymmetricKey;

const NONCE_LEN: usize = 12;

pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Aead(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.append(&mut ciphertext);
    Ok(out)
}

pub fn decrypt(key: &SymmetricKey, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < NONCE_LEN {
        return Err(CryptoError::Aead("ciphertext shorter than nonce".into()));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| CryptoError::Aead(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = SymmetricKey::from_bytes([7u8; 32]);
        let blob = encrypt(&key, b"hello world").unwrap();
        let plain = decrypt(&key, &blob).unwrap();
        assert_eq!(plain, b"hello world");
    }

    #[test]
    fn wrong_key_fails() {
        let key = SymmetricKey::from_bytes([7u8; 32]);
        let other = SymmetricKey::from_bytes([9u8; 32]);
        let blob = encrypt(&key, b"hello world").unwrap();
        assert!(decrypt(&other, &blob).is_err());
    }
}
