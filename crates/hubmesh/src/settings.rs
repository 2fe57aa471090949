//! Overlay-wide settings shared by the coordinator and the provisioner.

use serde::{Deserialize, Serialize};

/// UDP port every hub listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 55121;

/// Name of the WireGuard interface on hubs.
pub const DEFAULT_INTERFACE: &str = "wg0";

/// Fixed re-run token attached to every setup operation.
pub const DEFAULT_TRIGGER_TOKEN: &str = "669";

/// Settings for one overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshSettings {
    /// Listen port of every hub, also used to build hub endpoints.
    pub listen_port: u16,
    /// Interface name; selects `/etc/wireguard/<name>.conf` and `wg-quick@<name>`.
    pub interface_name: String,
    /// Constant token handed to the orchestrator with each setup operation.
    pub trigger_token: String,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            interface_name: DEFAULT_INTERFACE.to_string(),
            trigger_token: DEFAULT_TRIGGER_TOKEN.to_string(),
        }
    }
}

impl MeshSettings {
    /// Path of the config file `wg-quick` reads.
    #[must_use]
    pub fn config_path(&self) -> String {
        format!("/etc/wireguard/{}.conf", self.interface_name)
    }

    /// Systemd unit managing the interface.
    #[must_use]
    pub fn unit_name(&self) -> String {
        format!("wg-quick@{}", self.interface_name)
    }
}
