//! HKDF-SHA-512 derivation and the password-based app-key KDF.

use hkdf::Hkdf;
use sha2::Sha512;

use super::CryptoError;
use super::keys::SymmetricKey;

/// Info string binding the password-derived app key. Distinct from the
/// ratchet's own root-key binding string so the two derivations can never
/// collide even if a salt were accidentally reused.
const APP_PASSWORD_KDF_INFO: &[u8] = b"AppPasswordKDF-v1";

/// HKDF-SHA-512 over `ikm` with `salt` and `info`, producing a 32-byte key.
pub fn hkdf_derive_32(salt: &[u8], ikm: &[u8], info: &[u8]) -> Result<SymmetricKey, CryptoError> {
    let hk = Hkdf::<Sha512>::new(Some(salt), ikm);
    let mut out = [0u8; 32];
    hk.expand(info, &mut out)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(SymmetricKey::from_bytes(out))
}

/// Deterministically derives `K_app` from the user's password bytes and a
/// per-installation salt. Same `(password, salt)` always yields the same
/// key, which is what lets the vault verify a password by attempting to
/// open the persisted blob rather than storing a separate verifier.
pub fn derive_app_key(password_bytes: &[u8], salt: &[u8]) -> Result<SymmetricKey, CryptoError> {
    hkdf_derive_32(salt, password_bytes, APP_PASSWORD_KDF_INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = derive_app_key(b"p@ss1", b"saltsaltsaltsaltsaltsaltsaltsalt").unwrap();
        let b = derive_app_key(b"p@ss1", b"saltsaltsaltsaltsaltsaltsaltsalt").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_password_different_key() {
        let a = derive_app_key(b"p@ss1", b"saltsaltsaltsaltsaltsaltsaltsalt").unwrap();
        let b = derive_app_key(b"p@ss2", b"saltsaltsaltsaltsaltsaltsaltsalt").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
