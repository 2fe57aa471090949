//! WireGuard primitives for the hubmesh overlay.
//!
//! This crate provides Curve25519 key material, deterministic overlay
//! address allocation and `wg-quick` configuration rendering. It performs no
//! I/O beyond reading the operating system's random source.

pub mod address;
pub mod config;
pub mod error;
mod keys;

pub use address::{
    hub_address, spoke_address, AddressAllocator, Ipv4Address, MESH_NETWORK, OVERLAY_PREFIX,
};
pub use config::{render_config, InterfaceConfig, PeerEntry, FORWARDING_PRE_UP};
pub use error::{EnvelopeKind, Result, WireGuardError};
pub use keys::{
    unwrap_pkcs8, unwrap_spki, DerKeyPair, KeyMaterialProvider, KeyPair, KeySource, PrivateKey,
    PublicKey, X25519Source, KEY_SIZE, PKCS8_PREFIX_LEN, SPKI_PREFIX_LEN,
};
