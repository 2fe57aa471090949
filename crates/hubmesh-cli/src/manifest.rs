//! Topology manifest loading.
//!
//! ```json
//! {
//!   "name": "office",
//!   "settings": { "listenPort": 55121, "interfaceName": "wg0" },
//!   "hubs": [
//!     { "name": "hub-a", "user": "root", "host": "203.0.113.1", "privateKeyPath": "keys/hub-a" }
//!   ],
//!   "spokes": ["laptop", "phone"],
//!   "reserved": ["10.169.0.9"]
//! }
//! ```
//!
//! Relative key paths are resolved against the manifest's directory. Generated
//! WireGuard keys live next to the manifest in `<stem>.state.json`.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hubmesh::{Connection, Coordinator, MeshSettings, Node};
use hubmesh_wireguard::{AddressAllocator, MESH_NETWORK};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CliError;
use crate::state::KeyState;

const DEFAULT_STATE_FILE: &str = "hubmesh.state.json";

fn default_name() -> String {
    "hubmesh".to_string()
}

/// A declared overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Overlay name, used in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Overlay settings; omitted fields take their defaults.
    #[serde(default)]
    pub settings: MeshSettings,
    /// Hubs in address order.
    pub hubs: Vec<HubEntry>,
    /// Spoke names, without the `spoke-` prefix.
    #[serde(default)]
    pub spokes: Vec<String>,
    /// Overlay addresses already in use elsewhere; never handed out.
    #[serde(default)]
    pub reserved: Vec<Ipv4Addr>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

/// A hub and how to log in to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubEntry {
    /// Hub name.
    pub name: String,
    /// SSH login user.
    pub user: String,
    /// Public hostname or IP.
    pub host: String,
    /// PEM private key used to log in.
    pub private_key_path: PathBuf,
}

impl Manifest {
    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid manifest.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|e| CliError::manifest(path, e))?;
        let mut manifest = Self::from_json(&text).map_err(|e| match e {
            CliError::Manifest { reason, .. } => CliError::manifest(path, reason),
            other => other,
        })?;
        manifest.path = Some(path.to_path_buf());
        debug!(
            path = %path.display(),
            hubs = manifest.hubs.len(),
            spokes = manifest.spokes.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    /// Parses a manifest; relative paths resolve against the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a valid manifest.
    pub fn from_json(text: &str) -> Result<Self, CliError> {
        serde_json::from_str(text).map_err(|e| CliError::manifest("<inline>", e))
    }

    /// Applies command-line overrides to the settings.
    pub fn override_settings(&mut self, listen_port: Option<u16>, interface: Option<String>) {
        if let Some(port) = listen_port {
            self.settings.listen_port = port;
        }
        if let Some(interface) = interface {
            self.settings.interface_name = interface;
        }
    }

    /// Default key state file: `<manifest stem>.state.json` beside the manifest.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.with_extension("state.json"),
            None => PathBuf::from(DEFAULT_STATE_FILE),
        }
    }

    fn source(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from("<inline>"))
    }

    fn key_path(&self, entry: &HubEntry) -> PathBuf {
        if entry.private_key_path.is_absolute() {
            return entry.private_key_path.clone();
        }
        match self.path.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(&entry.private_key_path),
            None => entry.private_key_path.clone(),
        }
    }

    fn allocator(&self) -> Result<AddressAllocator, CliError> {
        if let Some(outside) = self.reserved.iter().find(|a| !MESH_NETWORK.contains(**a)) {
            return Err(CliError::manifest(
                self.source(),
                format!("reserved address {outside} is outside {MESH_NETWORK}"),
            ));
        }
        Ok(AddressAllocator::with_reserved(self.reserved.iter().copied()))
    }

    /// Builds the coordinator, reading every hub's SSH key.
    ///
    /// Addresses are assigned in manifest order. Nodes found in `state` keep
    /// their key pairs; the rest get fresh ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a key file is unreadable, a hub name repeats, a
    /// reserved address lies outside the mesh, or the address space runs out.
    pub fn build(&self, state: &KeyState) -> Result<Coordinator, CliError> {
        if self.hubs.is_empty() {
            warn!(mesh = %self.name, "manifest declares no hubs; spokes will have no peers");
        }

        let mut coordinator = Coordinator::new(self.name.clone(), self.settings.clone())
            .with_allocator(self.allocator()?)
            .with_known_keys(state.keys.clone());
        for entry in &self.hubs {
            let path = self.key_path(entry);
            let private_key = fs::read_to_string(&path).map_err(|source| CliError::SshKey {
                hub: entry.name.clone(),
                path: path.clone(),
                source,
            })?;
            let node = Node::new(
                entry.name.clone(),
                Connection::new(entry.user.clone(), entry.host.clone(), private_key),
            );
            coordinator.add_hub(Arc::new(node))?;
        }
        for spoke in &self.spokes {
            coordinator.add_spoke(spoke)?;
        }
        Ok(coordinator)
    }

    /// Builds the coordinator with keys from `state_path`, saving new ones.
    ///
    /// Entries for nodes no longer in the manifest are kept, so removing and
    /// re-adding a node does not rotate its keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file is unreadable or unwritable, or if
    /// [`build`](Self::build) fails.
    pub fn open(&self, state_path: &Path) -> Result<Coordinator, CliError> {
        let state = KeyState::load(state_path)?;
        let coordinator = self.build(&state)?;

        let mut updated = state.clone();
        updated.merge(coordinator.key_pairs());
        if updated != state {
            updated.save(state_path)?;
        }
        Ok(coordinator)
    }
}
