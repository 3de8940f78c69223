//! ML-KEM-1024 façade.
//!
//! Backed by `pqcrypto-kyber`'s Kyber1024 parameter set — the closest real
//! crate in the available ecosystem to the standardized ML-KEM-1024 (the
//! pack's `Qubee` and `construct-messenger-web` repos both reach for the
//! same crate for this). Nothing outside this module imports
//! `pqcrypto_kyber` directly, so swapping in a FIPS 203 `ml-kem`
//! implementation later only touches this file.

use pqcrypto_kyber::kyber1024;
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};

use super::CryptoError;
use super::keys::{KemCiphertext, KemKeyPair, KemPublicKey, KemSecretKey, SymmetricKey};

pub fn generate_kem_keypair() -> KemKeyPair {
    let (public, secret) = kyber1024::keypair();
    KemKeyPair {
        secret: KemSecretKey(secret.as_bytes().to_vec()),
        public: KemPublicKey(public.as_bytes().to_vec()),
    }
}

/// Encapsulate against a recipient's public key, producing `(ciphertext,
/// shared_secret)`. The ciphertext travels in the message header; the
/// shared secret feeds the root-key HKDF.
pub fn encapsulate(
    public: &KemPublicKey,
) -> Result<(KemCiphertext, SymmetricKey), CryptoError> {
    let pk = kyber1024::PublicKey::from_bytes(&public.0)
        .map_err(|e| CryptoError::Kem(e.to_string()))?;
    let (shared_secret, ciphertext) = kyber1024::encapsulate(&pk);
    let ss_bytes: [u8; 32] = shared_secret
        .as_bytes()
        .try_into()
        .map_err(|_| CryptoError::Kem("unexpected shared secret length".into()))?;
    Ok((
        KemCiphertext(ciphertext.as_bytes().to_vec()),
        SymmetricKey::from_bytes(ss_bytes),
    ))
}

/// Decapsulate a ciphertext using a local secret key (either the reserve
/// `finalPQKemPrivateKey` or a matching one-time PQ private).
pub fn decapsulate(
    secret: &KemSecretKey,
    ciphertext: &KemCiphertext,
) -> Result<SymmetricKey, CryptoError> {
    let sk = kyber1024::SecretKey::from_bytes(&secret.0)
        .map_err(|e| CryptoError::Kem(e.to_string()))?;
    let ct = kyber1024::Ciphertext::from_bytes(&ciphertext.0)
        .map_err(|e| CryptoError::Kem(e.to_string()))?;
    let shared_secret = kyber1024::decapsulate(&ct, &sk);
    let ss_bytes: [u8; 32] = shared_secret
        .as_bytes()
        .try_into()
        .map_err(|_| CryptoError::Kem("unexpected shared secret length".into()))?;
    Ok(SymmetricKey::from_bytes(ss_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let kp = generate_kem_keypair();
        let (ct, ss_sender) = encapsulate(&kp.public).unwrap();
        let ss_recipient = decapsulate(&kp.secret, &ct).unwrap();
        assert_eq!(ss_sender.as_bytes(), ss_recipient.as_bytes());
    }
}
