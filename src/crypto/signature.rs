//! Ed25519 signing and verification.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use super::CryptoError;
use super::keys::{Ed25519KeyPair, Ed25519PublicKey, Ed25519SecretKey, Signature};

pub fn generate_ed25519_keypair() -> Ed25519KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    Ed25519KeyPair {
        secret: Ed25519SecretKey(signing_key.to_bytes()),
        public: Ed25519PublicKey(signing_key.verifying_key().to_bytes()),
    }
}

pub fn sign(secret: &Ed25519SecretKey, message: &[u8]) -> Signature {
    let signing_key = SigningKey::from_bytes(&secret.0);
    Signature(signing_key.sign(message).to_bytes())
}

pub fn verify(
    public: &Ed25519PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let verifying_key = VerifyingKey::from_bytes(&public.0).map_err(|_| CryptoError::Signature)?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::Signature)
}
