//! Centralized error taxonomy for the crypto session core.
//!
//! Flat enum, one variant per error kind from the spec's error taxonomy. No
//! nested causes beyond `#[from]` wiring for the handful of primitive-crate
//! errors that cross into this type at a clean boundary (JSON/bincode decode
//! of opaque blobs, the crypto façade's own error).

use thiserror::Error;

use crate::crypto::CryptoError;

/// Error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // --- State errors ---
    #[error("session not initialized")]
    SessionNotInitialized,
    #[error("database not initialized")]
    DatabaseNotInitialized,
    #[error("transport not initialized")]
    TransportNotInitialized,
    #[error("receiver delegate not set")]
    ReceiverDelegateNotSet,

    // --- Credential errors ---
    #[error("invalid password")]
    InvalidPassword,
    #[error("app password error: {0}")]
    AppPasswordError(String),
    #[error("salt error: {0}")]
    SaltError(String),

    // --- Identity errors ---
    #[error("invalid secret name: {0}")]
    InvalidSecretName(String),
    #[error("invalid device identity")]
    InvalidDeviceIdentity,
    #[error("missing session identity for secretName={secret_name} deviceId={device_id}")]
    MissingSessionIdentity {
        secret_name: String,
        device_id: uuid::Uuid,
    },
    #[error("user already exists: {0}")]
    UserExists(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("cannot find user configuration for {0}")]
    CannotFindUserConfiguration(String),

    // --- Key-material errors ---
    #[error("cannot find one-time key")]
    CannotFindOneTimeKey,
    #[error("drained key inventory")]
    DrainedKeys,
    #[error("long-term key rotation failed: {0}")]
    LongTermKeyRotationFailed(String),
    #[error("one-time key upload failed: {0}")]
    OneTimeKeyUploadFailed(String),
    #[error("one-time key deletion failed: {0}")]
    OneTimeKeyDeletionFailed(String),
    #[error("invalid key id: {0}")]
    InvalidKeyId(String),

    // --- Cryptographic errors ---
    #[error("invalid signature")]
    InvalidSignature,
    #[error("missing signature")]
    MissingSignature,
    #[error("session encryption error: {0}")]
    SessionEncryptionError(String),
    #[error("session decryption error: {0}")]
    SessionDecryptionError(String),

    // --- Data errors ---
    #[error("configuration error: {0}")]
    ConfigurationError(String),
    #[error("cannot find communication: {0}")]
    CannotFindCommunication(String),
    #[error("cannot find contact: {0}")]
    CannotFindContact(String),
    #[error("props error: {0}")]
    PropsError(String),
    #[error("missing message")]
    MissingMessage,
    #[error("missing metadata")]
    MissingMetadata,
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    // --- Liveness errors ---
    #[error("connection is non-viable")]
    ConnectionIsNonViable,

    // --- Policy errors ---
    #[error("access denied")]
    AccessDenied,
    #[error("user is blocked")]
    UserIsBlocked,
    #[error("missing auth info")]
    MissingAuthInfo,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<CryptoError> for CoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Aead(_) => CoreError::SessionEncryptionError(err.to_string()),
            CryptoError::Signature => CoreError::InvalidSignature,
            CryptoError::Kem(_) => CoreError::SessionDecryptionError(err.to_string()),
            CryptoError::Kdf(_) => CoreError::ConfigurationError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::PropsError(err.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(err: bincode::Error) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}
