//! The coordinator: owns hubs and spokes and derives who peers with whom.
//!
//! Hubs form a full mesh. Every spoke is a peer of every hub. Hub configs are
//! pushed to the hubs; spoke configs are only exported.
//!
//! Construction is single-writer (`add_hub`/`add_spoke` take `&mut self`);
//! everything after that reads shared state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hubmesh_wireguard::{
    render_config, AddressAllocator, KeyMaterialProvider, KeyPair, PeerEntry,
};
use tracing::{debug, info};

use crate::deferred::Deferred;
use crate::error::{MeshError, Result};
use crate::export::{HubPeer, PublicKeyOnly, SpokeExport};
use crate::node::Node;
use crate::provision::{ProvisionOperation, Provisioner};
use crate::remote::RemoteExecutor;
use crate::settings::MeshSettings;
use crate::topology::{Hub, HubId, PeerDescriptor, Spoke};

/// Owner of an overlay's hubs, spokes and address counters.
#[derive(Debug)]
pub struct Coordinator {
    name: String,
    settings: MeshSettings,
    keys: KeyMaterialProvider,
    known_keys: HashMap<String, KeyPair>,
    allocator: AddressAllocator,
    hubs: Vec<Hub>,
    spokes: Vec<Spoke>,
}

impl Coordinator {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new(name: impl Into<String>, settings: MeshSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            keys: KeyMaterialProvider::default(),
            known_keys: HashMap::new(),
            allocator: AddressAllocator::new(),
            hubs: Vec::new(),
            spokes: Vec::new(),
        }
    }

    /// Uses a different key source.
    #[must_use]
    pub fn with_key_provider(mut self, keys: KeyMaterialProvider) -> Self {
        self.keys = keys;
        self
    }

    /// Reuses previously generated key pairs, keyed by hub or spoke name.
    ///
    /// A node found here keeps its key pair instead of getting a fresh one.
    #[must_use]
    pub fn with_known_keys(mut self, keys: impl IntoIterator<Item = (String, KeyPair)>) -> Self {
        self.known_keys.extend(keys);
        self
    }

    /// Uses a pre-seeded allocator, e.g. one with reserved addresses.
    #[must_use]
    pub fn with_allocator(mut self, allocator: AddressAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Overlay name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overlay settings.
    #[must_use]
    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    /// Hubs in registration order.
    #[must_use]
    pub fn hubs(&self) -> &[Hub] {
        &self.hubs
    }

    /// Spokes in registration order.
    #[must_use]
    pub fn spokes(&self) -> &[Spoke] {
        &self.spokes
    }

    /// Looks up a hub by name.
    #[must_use]
    pub fn hub(&self, name: &str) -> Option<&Hub> {
        self.hubs.iter().find(|h| h.name() == name)
    }

    /// Key pairs of every registered hub and spoke, by name.
    #[must_use]
    pub fn key_pairs(&self) -> BTreeMap<String, KeyPair> {
        self.hubs
            .iter()
            .map(|h| (h.name().to_string(), h.key_pair().clone()))
            .chain(
                self.spokes
                    .iter()
                    .map(|s| (s.name().to_string(), s.key_pair().clone())),
            )
            .collect()
    }

    fn key_pair_for(&self, name: &str) -> Result<KeyPair> {
        if let Some(known) = self.known_keys.get(name) {
            debug!(mesh = %self.name, node = %name, "reusing known key pair");
            return Ok(known.clone());
        }
        Ok(self.keys.generate()?)
    }

    /// Registers a node as the next hub.
    ///
    /// The hub gets the next hub address, a key pair, forwarding, and
    /// advertises the whole mesh network as routable through it.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name, an exhausted or colliding address, or a key
    /// generation failure.
    pub fn add_hub(&mut self, node: Arc<Node>) -> Result<&Hub> {
        if self.hub(&node.name).is_some() {
            return Err(MeshError::DuplicateHub(node.name.clone()));
        }

        // Keys first: a failed generation must not use up an address.
        let key_pair = self.key_pair_for(&node.name)?;
        let address = self.allocator.next_hub()?;
        let hub = Hub::new(
            HubId::new(self.hubs.len()),
            node,
            key_pair,
            address,
            self.settings.listen_port,
        );

        info!(
            mesh = %self.name,
            hub = %hub.name(),
            %address,
            public_key = %hub.public_key(),
            "registered hub"
        );

        self.hubs.push(hub);
        Ok(&self.hubs[self.hubs.len() - 1])
    }

    /// Registers a spoke named `spoke-<name>`.
    ///
    /// # Errors
    ///
    /// Fails on an exhausted or colliding address or a key generation failure.
    pub fn add_spoke(&mut self, name: &str) -> Result<&Spoke> {
        let name = format!("spoke-{name}");
        let key_pair = self.key_pair_for(&name)?;
        let address = self.allocator.next_spoke()?;
        let spoke = Spoke::new(name, key_pair, address);

        info!(
            mesh = %self.name,
            spoke = %spoke.name(),
            %address,
            public_key = %spoke.key_pair().public_key(),
            "registered spoke"
        );

        self.spokes.push(spoke);
        Ok(&self.spokes[self.spokes.len() - 1])
    }

    /// Every other hub, then every spoke.
    #[must_use]
    pub fn peers_of_hub(&self, hub: &Hub) -> Vec<PeerDescriptor> {
        self.hubs
            .iter()
            .filter(|other| other.id() != hub.id())
            .map(Hub::as_peer)
            .chain(self.spokes.iter().map(Spoke::as_peer))
            .collect()
    }

    /// The rendered config for `hub`, available once every peer endpoint is.
    #[must_use]
    pub fn hub_config(&self, hub: &Hub) -> Deferred<String> {
        let iface = hub.interface_config();
        let peers = self
            .peers_of_hub(hub)
            .iter()
            .map(PeerDescriptor::deferred)
            .collect::<Vec<_>>();
        Deferred::join_all(format!("{}.peers", hub.name()), peers).try_map(
            format!("{}.config", hub.name()),
            move |peers: Vec<PeerEntry>| render_config(&iface, Some(peers.as_slice())),
        )
    }

    /// Spoke configurations for external installation, one per spoke.
    ///
    /// Waits for every hub endpoint.
    ///
    /// # Errors
    ///
    /// Fails if a hub's host never resolves.
    pub async fn spoke_config(&self) -> Result<Vec<SpokeExport>> {
        let mut hubs = Vec::with_capacity(self.hubs.len());
        for hub in &self.hubs {
            hubs.push(HubPeer {
                address: hub.addresses().to_vec(),
                endpoint: hub.endpoint().resolve().await?,
                key_pair: PublicKeyOnly {
                    public_key: *hub.public_key(),
                },
                allowed_ips: hub.allowed_ips().to_vec(),
            });
        }

        Ok(self
            .spokes
            .iter()
            .map(|spoke| SpokeExport {
                name: spoke.name().to_string(),
                addresses: spoke.addresses().to_vec(),
                key_pair: spoke.key_pair().clone(),
                peers: hubs.clone(),
            })
            .collect())
    }

    /// One provisioning operation per hub, in hub order.
    ///
    /// Nothing runs until the operations are executed; they may run in any
    /// order relative to each other.
    pub fn configure_hubs<E: RemoteExecutor>(
        &self,
        provisioner: &Provisioner<E>,
    ) -> Vec<ProvisionOperation<E>> {
        self.hubs
            .iter()
            .map(|hub| provisioner.apply(hub.node(), self.hub_config(hub)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Connection;
    use crate::remote::{CommandOutput, RemoteCommand};
    use hubmesh_wireguard::{DerKeyPair, KeySource, WireGuardError, X25519Source, MESH_NETWORK};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullExecutor;

    impl RemoteExecutor for NullExecutor {
        async fn run(&self, _command: &RemoteCommand) -> Result<CommandOutput> {
            Ok(CommandOutput::default())
        }
    }

    fn node(name: &str, host: &str) -> Arc<Node> {
        Arc::new(Node::new(name, Connection::new("root", host, "KEY")))
    }

    fn mesh(hubs: usize, spokes: usize) -> Coordinator {
        let mut coordinator = Coordinator::new("test", MeshSettings::default());
        for i in 1..=hubs {
            coordinator
                .add_hub(node(&format!("hub-{i}"), &format!("203.0.113.{i}")))
                .expect("hub");
        }
        for i in 1..=spokes {
            coordinator.add_spoke(&format!("s{i}")).expect("spoke");
        }
        coordinator
    }

    #[test]
    fn hubs_get_sequential_addresses() {
        let coordinator = mesh(3, 0);
        for (i, hub) in coordinator.hubs().iter().enumerate() {
            let addr = hub.addresses()[0];
            assert_eq!(addr.address, Ipv4Addr::new(10, 169, 0, i as u8 + 1));
            assert_eq!(addr.netmask, 16);
            assert_eq!(hub.allowed_ips(), &[MESH_NETWORK]);
            assert!(hub.enable_forwarding());
        }
    }

    #[test]
    fn spokes_get_own_subnets() {
        let coordinator = mesh(1, 3);
        for (i, spoke) in coordinator.spokes().iter().enumerate() {
            assert_eq!(spoke.name(), format!("spoke-s{}", i + 1));
            assert_eq!(spoke.addresses()[0].address, Ipv4Addr::new(10, 169, i as u8 + 1, 1));
        }
    }

    #[test]
    fn peers_exclude_self_and_list_hubs_before_spokes() {
        let coordinator = mesh(3, 2);
        for hub in coordinator.hubs() {
            let peers = coordinator.peers_of_hub(hub);
            assert_eq!(peers.len(), 4);
            assert!(peers.iter().all(|p| p.public_key != *hub.public_key()));
            assert!(peers[..2].iter().all(|p| p.endpoint.is_some()));
            assert!(peers[2..].iter().all(|p| p.endpoint.is_none()));
        }
    }

    #[test]
    fn single_hub_has_only_spokes() {
        let coordinator = mesh(1, 2);
        let peers = coordinator.peers_of_hub(&coordinator.hubs()[0]);
        assert_eq!(peers.len(), 2);
        assert!(peers.iter().all(|p| p.endpoint.is_none()));
    }

    #[test]
    fn duplicate_hub_is_rejected() {
        let mut coordinator = mesh(1, 0);
        let err = coordinator.add_hub(node("hub-1", "198.51.100.1")).expect_err("duplicate");
        assert!(matches!(err, MeshError::DuplicateHub(name) if name == "hub-1"));
        assert_eq!(coordinator.hubs().len(), 1);
    }

    #[test]
    fn reserved_address_blocks_allocation() {
        let mut coordinator = Coordinator::new("test", MeshSettings::default())
            .with_allocator(AddressAllocator::with_reserved([Ipv4Addr::new(10, 169, 0, 1)]));
        let err = coordinator.add_hub(node("hub-1", "198.51.100.1")).expect_err("collision");
        assert!(matches!(err, MeshError::WireGuard(WireGuardError::AddressInUse(_))));
    }

    /// Fails the first `failures` generations, then produces real keys.
    struct FlakySource {
        failures: AtomicUsize,
    }

    impl FlakySource {
        fn failing(times: usize) -> KeyMaterialProvider {
            KeyMaterialProvider::new(Self {
                failures: AtomicUsize::new(times),
            })
        }
    }

    impl KeySource for FlakySource {
        fn generate_der(&self) -> hubmesh_wireguard::Result<DerKeyPair> {
            let failed = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(WireGuardError::KeyGeneration("no entropy".into()));
            }
            X25519Source.generate_der()
        }
    }

    #[test]
    fn key_failure_is_fatal() {
        let mut coordinator = Coordinator::new("test", MeshSettings::default())
            .with_key_provider(FlakySource::failing(usize::MAX));
        assert!(coordinator.add_spoke("laptop").is_err());
        assert!(coordinator.add_hub(node("hub-1", "198.51.100.1")).is_err());
        assert!(coordinator.spokes().is_empty());
        assert!(coordinator.hubs().is_empty());
    }

    #[test]
    fn failed_key_generation_keeps_the_address_free() {
        let mut coordinator = Coordinator::new("test", MeshSettings::default())
            .with_key_provider(FlakySource::failing(2));

        assert!(coordinator.add_hub(node("hub-1", "198.51.100.1")).is_err());
        assert!(coordinator.add_spoke("laptop").is_err());

        let hub = coordinator.add_hub(node("hub-1", "198.51.100.1")).expect("hub");
        assert_eq!(hub.addresses()[0].to_string(), "10.169.0.1/16");
        let spoke = coordinator.add_spoke("laptop").expect("spoke");
        assert_eq!(spoke.addresses()[0].to_string(), "10.169.1.1/16");
    }

    #[test]
    fn known_keys_are_reused_and_new_nodes_get_fresh_ones() {
        let first = mesh(2, 1);
        let known = first.key_pairs();
        assert_eq!(
            known.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["hub-1", "hub-2", "spoke-s1"]
        );

        let mut second = Coordinator::new("test", MeshSettings::default())
            .with_known_keys(known.clone());
        second.add_hub(node("hub-1", "203.0.113.1")).expect("hub-1");
        second.add_spoke("s1").expect("s1");
        second.add_spoke("s2").expect("s2");

        let reused = second.key_pairs();
        assert_eq!(reused["hub-1"], known["hub-1"]);
        assert_eq!(reused["spoke-s1"], known["spoke-s1"]);
        assert!(known.values().all(|k| k != &reused["spoke-s2"]));
    }

    #[tokio::test]
    async fn hub_config_renders_other_hubs_with_endpoints() {
        let coordinator = mesh(2, 1);
        let hub = &coordinator.hubs()[0];
        let config = coordinator.hub_config(hub).resolve().await.expect("render");

        assert!(config.starts_with("[Interface]\nAddress = 10.169.0.1/16\nListenPort = 55121\n"));
        assert!(config.contains("PreUp = sysctl -w net.ipv4.ip_forward=1\n"));
        assert_eq!(config.matches("[Peer]").count(), 2);
        assert_eq!(config.matches("Endpoint = ").count(), 1);
        assert!(config.contains(
            "AllowedIPs = 10.169.0.2/32,10.169.0.0/16\nEndpoint = 203.0.113.2:55121\n"
        ));
        assert!(config.contains("AllowedIPs = 10.169.1.1/32\n"));
        assert!(!config.contains(&hub.public_key().to_base64()));
    }

    #[tokio::test]
    async fn spoke_config_lists_every_hub() {
        let coordinator = mesh(2, 2);
        let exports = coordinator.spoke_config().await.expect("export");
        assert_eq!(exports.len(), 2);
        for (export, spoke) in exports.iter().zip(coordinator.spokes()) {
            assert_eq!(&export.key_pair, spoke.key_pair());
            assert_eq!(export.peers.len(), 2);
            assert_eq!(export.peers[0].endpoint, "203.0.113.1:55121");
            assert_eq!(export.peers[1].allowed_ips, vec![MESH_NETWORK]);
        }
    }

    #[tokio::test]
    async fn spoke_config_with_unresolvable_hub_fails() {
        let mut coordinator = Coordinator::new("test", MeshSettings::default());
        let (resolver, host) = Deferred::<String>::channel("hub-1.host");
        coordinator
            .add_hub(Arc::new(Node::new("hub-1", Connection::deferred("root", host, "KEY"))))
            .expect("hub");
        coordinator.add_spoke("laptop").expect("spoke");
        drop(resolver);

        assert!(matches!(coordinator.spoke_config().await, Err(MeshError::Resolve(_))));
    }

    #[test]
    fn configure_hubs_yields_one_operation_per_hub() {
        let coordinator = mesh(3, 1);
        let provisioner = Provisioner::new(NullExecutor, MeshSettings::default());
        let ops = coordinator.configure_hubs(&provisioner);
        let names: Vec<&str> = ops.iter().map(ProvisionOperation::name).collect();
        assert_eq!(names, vec!["hub-1-setup", "hub-2-setup", "hub-3-setup"]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn no_hub_peers_with_itself(hubs in 2usize..6, spokes in 0usize..4) {
                let coordinator = mesh(hubs, spokes);
                for hub in coordinator.hubs() {
                    let peers = coordinator.peers_of_hub(hub);
                    prop_assert_eq!(peers.len(), hubs - 1 + spokes);
                    prop_assert!(peers.iter().all(|p| p.name.as_deref() != Some(hub.name())));
                }
            }
        }
    }
}
