//! Hubs, spokes and the peer view other nodes get of them.

use std::fmt;
use std::sync::Arc;

use hubmesh_wireguard::{InterfaceConfig, Ipv4Address, KeyPair, PeerEntry, PublicKey, MESH_NETWORK};

use crate::deferred::Deferred;
use crate::error::ResolveError;
use crate::node::Node;

/// Identity of a hub within one [`Coordinator`](crate::Coordinator).
///
/// Peer lists exclude a hub by id, never by comparing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HubId(usize);

impl HubId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hub#{}", self.0)
    }
}

/// Server-role node: listens, forwards, and meshes with every other hub.
pub struct Hub {
    id: HubId,
    name: String,
    node: Arc<Node>,
    key_pair: KeyPair,
    listen_port: u16,
    addresses: Vec<Ipv4Address>,
    endpoint: Deferred<String>,
    allowed_ips: Vec<Ipv4Address>,
    enable_forwarding: bool,
}

impl Hub {
    pub(crate) fn new(
        id: HubId,
        node: Arc<Node>,
        key_pair: KeyPair,
        address: Ipv4Address,
        listen_port: u16,
    ) -> Self {
        let endpoint = node.connection.host.map(move |host| format!("{host}:{listen_port}"));
        Self {
            id,
            name: node.name.clone(),
            node,
            key_pair,
            listen_port,
            addresses: vec![address],
            endpoint,
            allowed_ips: vec![MESH_NETWORK],
            enable_forwarding: true,
        }
    }

    /// Coordinator-scoped identity.
    #[must_use]
    pub fn id(&self) -> HubId {
        self.id
    }

    /// Hub name (the node's name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Machine this hub runs on.
    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// The hub's key pair.
    #[must_use]
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The hub's public key.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    /// UDP listen port.
    #[must_use]
    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Overlay addresses of the interface.
    #[must_use]
    pub fn addresses(&self) -> &[Ipv4Address] {
        &self.addresses
    }

    /// `host:port`, available once the node's host is.
    #[must_use]
    pub fn endpoint(&self) -> &Deferred<String> {
        &self.endpoint
    }

    /// Networks other nodes route through this hub.
    #[must_use]
    pub fn allowed_ips(&self) -> &[Ipv4Address] {
        &self.allowed_ips
    }

    /// Whether the hub forwards packets.
    #[must_use]
    pub fn enable_forwarding(&self) -> bool {
        self.enable_forwarding
    }

    /// The hub's own `[Interface]` section. Needs no peer endpoints.
    #[must_use]
    pub fn interface_config(&self) -> InterfaceConfig {
        InterfaceConfig {
            addresses: self.addresses.clone(),
            listen_port: Some(self.listen_port),
            private_key: self.key_pair.private_key().clone(),
            enable_forwarding: self.enable_forwarding,
        }
    }

    /// How other nodes see this hub.
    #[must_use]
    pub fn as_peer(&self) -> PeerDescriptor {
        PeerDescriptor {
            name: Some(self.name.clone()),
            addresses: self.addresses.clone(),
            endpoint: Some(self.endpoint.clone()),
            public_key: *self.key_pair.public_key(),
            allowed_ips: Some(self.allowed_ips.clone()),
        }
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("public_key", self.key_pair.public_key())
            .field("addresses", &self.addresses)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Client-role node: no listen port, no forwarding, configured externally.
#[derive(Debug)]
pub struct Spoke {
    name: String,
    key_pair: KeyPair,
    addresses: Vec<Ipv4Address>,
}

impl Spoke {
    pub(crate) fn new(name: String, key_pair: KeyPair, address: Ipv4Address) -> Self {
        Self {
            name,
            key_pair,
            addresses: vec![address],
        }
    }

    /// Spoke name, `spoke-<name>`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The spoke's key pair.
    #[must_use]
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Overlay addresses of the spoke.
    #[must_use]
    pub fn addresses(&self) -> &[Ipv4Address] {
        &self.addresses
    }

    /// How hubs see this spoke.
    #[must_use]
    pub fn as_peer(&self) -> PeerDescriptor {
        PeerDescriptor {
            name: Some(self.name.clone()),
            addresses: self.addresses.clone(),
            endpoint: None,
            public_key: *self.key_pair.public_key(),
            allowed_ips: None,
        }
    }
}

/// A node as it appears in someone else's peer list.
///
/// Only ever carries the public key. Recomputed on demand.
#[derive(Debug, Clone)]
pub struct PeerDescriptor {
    /// Peer name.
    pub name: Option<String>,
    /// Peer's own overlay addresses.
    pub addresses: Vec<Ipv4Address>,
    /// Where to dial the peer, if it listens.
    pub endpoint: Option<Deferred<String>>,
    /// Peer's public key.
    pub public_key: PublicKey,
    /// Extra networks routed through the peer.
    pub allowed_ips: Option<Vec<Ipv4Address>>,
}

impl PeerDescriptor {
    /// Waits for the endpoint and returns a renderable entry.
    pub async fn resolve(&self) -> Result<PeerEntry, ResolveError> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => Some(endpoint.resolve().await?),
            None => None,
        };
        Ok(PeerEntry {
            name: self.name.clone(),
            public_key: self.public_key,
            addresses: self.addresses.clone(),
            allowed_ips: self.allowed_ips.clone(),
            endpoint,
        })
    }

    /// [`resolve`](Self::resolve) as a deferred value.
    #[must_use]
    pub fn deferred(&self) -> Deferred<PeerEntry> {
        let peer = self.clone();
        let label = format!("{}.peer", self.name.as_deref().unwrap_or("peer"));
        Deferred::from_future(label, async move { peer.resolve().await })
    }
}
