//! Embedder-supplied tunables.
//!
//! The core is a library, not a process — there is no environment to read
//! configuration from, so unlike a server's config layer this is a plain
//! `Default`-able struct the embedder constructs and passes to
//! [`crate::session_actor::CryptoSession::register`] or
//! [`crate::session_actor::CryptoSession::start`].

use std::time::Duration;

/// Tunable parameters the spec leaves as "implementation-chosen".
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// One-time key count, per flavor, below which a refill is triggered.
    pub one_time_key_low_watermark: usize,
    /// Target one-time key inventory size, per flavor, after a refill.
    pub one_time_key_target: usize,
    /// How far in the past `rotateKeysDate` must be before a scheduled
    /// rotation fires.
    pub rotation_interval: Duration,
    /// Number of skipped message keys retained per ratchet session before
    /// the oldest are evicted.
    pub max_skipped_message_keys: usize,
    /// Base delay for the job processor's exponential backoff.
    pub job_retry_base_backoff: Duration,
    /// Ceiling for the job processor's exponential backoff.
    pub job_retry_max_backoff: Duration,
    /// Attempts after which a job is dropped rather than retried.
    pub job_retry_max_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            one_time_key_low_watermark: 10,
            one_time_key_target: 100,
            rotation_interval: Duration::from_secs(7 * 24 * 3600),
            max_skipped_message_keys: 2000,
            job_retry_base_backoff: Duration::from_secs(1),
            job_retry_max_backoff: Duration::from_secs(5 * 60),
            job_retry_max_attempts: 10,
        }
    }
}
