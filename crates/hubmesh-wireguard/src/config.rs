//! WireGuard configuration file generation.
//!
//! Produces the INI-style text read by `wg-quick`. Output is line-oriented
//! and order-significant:
//!
//! ```text
//! [Interface]
//! Address = 10.169.0.1/16
//! ListenPort = 55121
//! PrivateKey = <base64>
//! PreUp = sysctl -w net.ipv4.ip_forward=1
//!
//! [Peer]
//! PublicKey = <base64>
//! AllowedIPs = 10.169.0.2/32,10.169.0.0/16
//! Endpoint = 203.0.113.7:55121
//! ```

use std::fmt::Write as FmtWrite;

use crate::address::Ipv4Address;
use crate::error::{Result, WireGuardError};
use crate::keys::{PrivateKey, PublicKey};

/// `PreUp` hook emitted for interfaces that forward traffic.
pub const FORWARDING_PRE_UP: &str = "sysctl -w net.ipv4.ip_forward=1";

/// The local `[Interface]` section.
#[derive(Clone, Debug)]
pub struct InterfaceConfig {
    /// Addresses assigned to the interface.
    pub addresses: Vec<Ipv4Address>,
    /// UDP listen port; omitted for interfaces that only dial out.
    pub listen_port: Option<u16>,
    /// The interface's private key.
    pub private_key: PrivateKey,
    /// Whether the host forwards packets between peers.
    pub enable_forwarding: bool,
}

impl InterfaceConfig {
    /// Creates an interface with no addresses, no listen port and no forwarding.
    #[must_use]
    pub fn new(private_key: PrivateKey) -> Self {
        Self {
            addresses: Vec::new(),
            listen_port: None,
            private_key,
            enable_forwarding: false,
        }
    }

    /// Adds an address.
    #[must_use]
    pub fn with_address(mut self, address: Ipv4Address) -> Self {
        self.addresses.push(address);
        self
    }

    /// Sets the listen port.
    #[must_use]
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }

    /// Enables IP forwarding on the host.
    #[must_use]
    pub fn with_forwarding(mut self) -> Self {
        self.enable_forwarding = true;
        self
    }
}

/// A fully resolved remote peer, ready to be written as a `[Peer]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerEntry {
    /// Name of the peer, for logs only.
    pub name: Option<String>,
    /// The peer's public key.
    pub public_key: PublicKey,
    /// The peer's own overlay addresses; rendered as `/32` host routes.
    pub addresses: Vec<Ipv4Address>,
    /// Extra networks routed through the peer, appended after the host routes.
    pub allowed_ips: Option<Vec<Ipv4Address>>,
    /// `host:port` to dial, if the peer listens.
    pub endpoint: Option<String>,
}

impl PeerEntry {
    /// The `AllowedIPs` value for this peer.
    ///
    /// Host routes are joined with `", "`. Explicit networks follow after a
    /// bare `","`, which is what downstream parsers expect.
    #[must_use]
    pub fn allowed_ips_value(&self) -> String {
        let mut value = join(self.addresses.iter().map(|a| a.host_route().to_string()));
        if let Some(extra) = self.allowed_ips.as_deref().filter(|e| !e.is_empty()) {
            value.push(',');
            value.push_str(&join(extra.iter().map(ToString::to_string)));
        }
        value
    }
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

/// Renders a configuration file.
///
/// With `peers` set to `None` only the `[Interface]` block is produced, which
/// `wg-quick` accepts as an interface with nobody to talk to yet.
///
/// # Errors
///
/// Returns [`WireGuardError::InvalidConfig`] if the interface or any peer has
/// no address.
pub fn render_config(iface: &InterfaceConfig, peers: Option<&[PeerEntry]>) -> Result<String> {
    if iface.addresses.is_empty() {
        return Err(WireGuardError::InvalidConfig(
            "interface has no address".to_string(),
        ));
    }

    let mut output = String::new();

    output.push_str("[Interface]\n");
    let _ = writeln!(
        output,
        "Address = {}",
        join(iface.addresses.iter().map(ToString::to_string))
    );
    if let Some(port) = iface.listen_port {
        let _ = writeln!(output, "ListenPort = {port}");
    }
    let _ = writeln!(output, "PrivateKey = {}", iface.private_key.to_base64());
    if iface.enable_forwarding {
        let _ = writeln!(output, "PreUp = {FORWARDING_PRE_UP}");
    }

    for peer in peers.unwrap_or_default() {
        if peer.addresses.is_empty() {
            return Err(WireGuardError::InvalidConfig(format!(
                "peer {} has no address",
                peer.name.as_deref().unwrap_or(&peer.public_key.to_base64())
            )));
        }

        output.push('\n');
        output.push_str("[Peer]\n");
        let _ = writeln!(output, "PublicKey = {}", peer.public_key.to_base64());
        let _ = writeln!(output, "AllowedIPs = {}", peer.allowed_ips_value());
        if let Some(ref endpoint) = peer.endpoint {
            let _ = writeln!(output, "Endpoint = {endpoint}");
        }
    }

    Ok(output)
}
