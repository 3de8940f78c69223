use thiserror::Error;

/// A single error surfaced by the crypto façade.
///
/// Per the façade's contract, callers never branch on the failure
/// reason inside a primitive — each variant only identifies *which*
/// primitive failed, not why.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AEAD operation failed")]
    Aead(String),
    #[error("signature verification failed")]
    Signature,
    #[error("KEM operation failed")]
    Kem(String),
    #[error("KDF operation failed")]
    Kdf(String),
}
