//! Spoke configuration handed to whatever sets up end-user devices.
//!
//! This is the one place a private key leaves the coordinator.

use hubmesh_wireguard::{render_config, InterfaceConfig, Ipv4Address, KeyPair, PeerEntry, PublicKey};
use serde::{Deserialize, Serialize};

/// Everything a spoke device needs to join the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpokeExport {
    /// Spoke name.
    pub name: String,
    /// Overlay addresses of the spoke.
    pub addresses: Vec<Ipv4Address>,
    /// Full key pair of the spoke, private half included.
    pub key_pair: KeyPair,
    /// One entry per hub.
    pub peers: Vec<HubPeer>,
}

/// A hub as listed in a [`SpokeExport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubPeer {
    /// Hub overlay addresses.
    pub address: Vec<Ipv4Address>,
    /// `host:port` of the hub.
    pub endpoint: String,
    /// Public half of the hub's key pair.
    pub key_pair: PublicKeyOnly,
    /// Networks routed through the hub.
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Vec<Ipv4Address>,
}

/// Wrapper that keeps the `keyPair.publicKey` shape without a private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyOnly {
    /// Base64 public key.
    pub public_key: PublicKey,
}

impl SpokeExport {
    /// Renders a `wg-quick` config for the spoke device.
    ///
    /// The spoke dials out only, so there is no `ListenPort` and no
    /// forwarding hook.
    ///
    /// # Errors
    ///
    /// Returns an error if the spoke or a hub has no address.
    pub fn render(&self) -> hubmesh_wireguard::Result<String> {
        let iface = InterfaceConfig {
            addresses: self.addresses.clone(),
            listen_port: None,
            private_key: self.key_pair.private_key().clone(),
            enable_forwarding: false,
        };
        let peers: Vec<PeerEntry> = self
            .peers
            .iter()
            .map(|hub| PeerEntry {
                name: None,
                public_key: hub.key_pair.public_key,
                addresses: hub.address.clone(),
                allowed_ips: Some(hub.allowed_ips.clone()),
                endpoint: Some(hub.endpoint.clone()),
            })
            .collect();
        render_config(&iface, Some(peers.as_slice()))
    }
}
