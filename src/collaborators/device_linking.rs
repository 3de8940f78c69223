//! The device-linking delegate (§6): approves or rejects a new device
//! presenting its configuration and a password to an already-registered
//! account. QR-code presentation and device-name lookup live entirely on
//! the embedder's side of this boundary — the core only consumes the
//! verdict.

use async_trait::async_trait;

use crate::identity::device_config::UserDeviceConfiguration;

pub struct LinkingApproval {
    pub secret_name: String,
    pub devices: Vec<UserDeviceConfiguration>,
    pub password: String,
}

#[async_trait]
pub trait DeviceLinkingDelegate: Send + Sync {
    /// Returns `Some` if the remote operator approved linking the device
    /// described by `configuration`, `None` otherwise.
    async fn request_linking(
        &self,
        configuration: UserDeviceConfiguration,
        password: String,
    ) -> Option<LinkingApproval>;
}
