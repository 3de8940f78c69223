//! Identity & Bundle Manager (§4.2): device key material, the signed
//! published bundle, and the manager that generates and maintains both.

pub mod bundle;
pub mod device_config;
pub mod device_keys;
pub mod manager;

pub use bundle::{Signed, SignedOneTimeKey, UserConfiguration};
pub use device_config::UserDeviceConfiguration;
pub use device_keys::DeviceKeys;
pub use manager::{CryptographicBundle, IdentityManager};
