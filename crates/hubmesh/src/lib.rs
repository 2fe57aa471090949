//! Hub-and-spoke WireGuard overlays.
//!
//! A [`Coordinator`] owns a set of hubs (servers with a public endpoint that
//! mesh with each other and forward traffic) and spokes (clients that only
//! talk to hubs). It allocates overlay addresses, generates keys, renders a
//! `wg-quick` config per hub and exports per-spoke configs.
//!
//! Hub hosts are usually not known when the overlay is declared, so anything
//! depending on them is a [`Deferred`] value. Applying configs goes through a
//! [`Provisioner`] and a [`RemoteExecutor`]; [`SshExecutor`] drives the system
//! ssh client.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hubmesh::{
//!     execute_all, Connection, Coordinator, MeshSettings, Node, Provisioner, SshExecutor,
//! };
//!
//! # async fn example() -> hubmesh::Result<()> {
//! let mut mesh = Coordinator::new("office", MeshSettings::default());
//! mesh.add_hub(Arc::new(Node::new("hub-a", Connection::new("root", "203.0.113.1", "PEM"))))?;
//! mesh.add_spoke("laptop")?;
//!
//! let provisioner = Provisioner::new(SshExecutor::new(), mesh.settings().clone());
//! let reports = execute_all(&mesh.configure_hubs(&provisioner)).await;
//! let exports = mesh.spoke_config().await?;
//! # let _ = (reports, exports);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod coordinator;
pub mod deferred;
pub mod error;
pub mod export;
pub mod node;
pub mod provision;
pub mod remote;
pub mod settings;
pub mod topology;

pub use coordinator::Coordinator;
pub use deferred::{Deferred, Resolver};
pub use error::{MeshError, ResolveError, Result};
pub use export::{HubPeer, PublicKeyOnly, SpokeExport};
pub use node::{Connection, Node, ResolvedConnection};
pub use provision::{execute_all, setup_script, ProvisionOperation, ProvisionReport, Provisioner};
pub use remote::{CommandOutput, RemoteCommand, RemoteExecutor, SshExecutor};
pub use settings::MeshSettings;
pub use topology::{Hub, HubId, PeerDescriptor, Spoke};

pub use hubmesh_wireguard;
