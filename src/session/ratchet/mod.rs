//! Double-Ratchet state machine (§4.4): hybrid X3DH/PQKEM bootstrap,
//! steady-state chain advancement, and the wire-shaped message types.

pub mod chain;
pub mod engine;
pub mod message;
pub mod state;

pub use engine::{decrypt, encrypt, OutboundResult, RATCHET_STATE_VERSION};
pub use message::{InitialHeader, RatchetHeader, RatchetMessage, SignedRatchetMessage};
pub use state::RatchetState;
