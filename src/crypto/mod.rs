//! Crypto Primitives Façade (§4.1).
//!
//! Key generation, AEAD, KDF, X25519/Ed25519, ML-KEM-1024, and signature
//! verification live here and nowhere else in the crate — every other
//! component calls into this façade rather than reaching for a crypto
//! crate directly, so a primitive swap (e.g. the ML-KEM backend, see
//! [`kem`]) touches one module.

mod aead;
mod dh;
mod error;
mod hash;
mod kdf;
mod kem;
pub mod keys;
mod signature;

pub use aead::{decrypt as aead_decrypt, encrypt as aead_encrypt};
pub use dh::{diffie_hellman, generate_x25519_keypair};
pub use error::CryptoError;
pub use hash::{sha256, sha512};
pub use kdf::{derive_app_key, hkdf_derive_32};
pub use kem::{decapsulate as kem_decapsulate, encapsulate as kem_encapsulate, generate_kem_keypair};
pub use signature::{generate_ed25519_keypair, sign, verify};
