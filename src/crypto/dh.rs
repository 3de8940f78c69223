//! X25519 key generation and Diffie-Hellman.

use rand_core::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use super::keys::{SymmetricKey, X25519KeyPair, X25519PublicKey, X25519SecretKey};

pub fn generate_x25519_keypair() -> X25519KeyPair {
    let secret = StaticSecret::random_from_rng(&mut OsRng);
    let public = PublicKey::from(&secret);
    X25519KeyPair {
        secret: X25519SecretKey(secret.to_bytes()),
        public: X25519PublicKey(*public.as_bytes()),
    }
}

/// Scalar multiplication between a local private key and a peer's public
/// key. The output is raw DH material — callers must pass it through HKDF
/// before using it as a key.
pub fn diffie_hellman(secret: &X25519SecretKey, public: &X25519PublicKey) -> SymmetricKey {
    let sk = StaticSecret::from(secret.0);
    let pk = PublicKey::from(public.0);
    let shared = sk.diffie_hellman(&pk);
    SymmetricKey::from_bytes(*shared.as_bytes())
}
