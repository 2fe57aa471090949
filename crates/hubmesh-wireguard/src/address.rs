//! Overlay IPv4 addressing.
//!
//! Hubs share the `10.169.0.0/16` mesh and are numbered `10.169.0.{i}`.
//! Each spoke gets its own third octet: `10.169.{i}.1`. All interface
//! addresses carry a `/16` mask.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{Result, WireGuardError};

/// Prefix length used for every overlay interface address.
pub const OVERLAY_PREFIX: u8 = 16;

/// Route advertised by every hub so peers send the whole mesh through it.
pub const MESH_NETWORK: Ipv4Address = Ipv4Address {
    address: Ipv4Addr::new(10, 169, 0, 0),
    netmask: OVERLAY_PREFIX,
};

/// Largest hub index (`10.169.0.254`).
pub const MAX_HUBS: usize = 254;

/// Largest spoke index (`10.169.255.1`).
pub const MAX_SPOKES: usize = 255;

/// An IPv4 address with its netmask, e.g. `10.169.0.1/16`.
///
/// Host bits are kept, unlike a network prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Address {
    /// Dotted-quad address.
    pub address: Ipv4Addr,
    /// Prefix length (0..=32).
    #[serde(deserialize_with = "deserialize_netmask")]
    pub netmask: u8,
}

impl Ipv4Address {
    /// Creates an address, validating the netmask.
    ///
    /// # Errors
    ///
    /// Returns an error if `netmask` is greater than 32.
    pub fn new(address: Ipv4Addr, netmask: u8) -> Result<Self> {
        Ipv4Net::new(address, netmask)
            .map_err(|e| WireGuardError::InvalidNetmask(e.to_string()))?;
        Ok(Self { address, netmask })
    }

    /// The same address as a single-host `/32` route.
    #[must_use]
    pub const fn host_route(&self) -> Self {
        Self {
            address: self.address,
            netmask: 32,
        }
    }

    /// Returns the address as an `ipnet` value.
    #[must_use]
    pub fn to_net(&self) -> Ipv4Net {
        // An out-of-range mask can only come from direct field writes.
        Ipv4Net::new(self.address, self.netmask).unwrap_or_else(|_| Ipv4Net::from(self.address))
    }

    /// Returns true if `other` falls inside this address's network.
    #[must_use]
    pub fn contains(&self, other: Ipv4Addr) -> bool {
        self.to_net().contains(&other)
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.netmask)
    }
}

impl FromStr for Ipv4Address {
    type Err = WireGuardError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, mask) = s
            .split_once('/')
            .ok_or_else(|| WireGuardError::InvalidAddress(format!("missing netmask: {s}")))?;
        let address = addr
            .parse::<Ipv4Addr>()
            .map_err(|e| WireGuardError::InvalidAddress(format!("{addr}: {e}")))?;
        let netmask = mask
            .parse::<u8>()
            .map_err(|_| WireGuardError::InvalidNetmask(mask.to_string()))?;
        Self::new(address, netmask)
    }
}

fn deserialize_netmask<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Netmask {
        Number(u8),
        Text(String),
    }

    let mask = match Netmask::deserialize(deserializer)? {
        Netmask::Number(n) => n,
        Netmask::Text(s) => s
            .trim()
            .parse::<u8>()
            .map_err(|_| serde::de::Error::custom(format!("invalid netmask: {s}")))?,
    };
    if mask > 32 {
        return Err(serde::de::Error::custom(format!("invalid netmask: {mask}")));
    }
    Ok(mask)
}

fn check_index(kind: &'static str, index: usize, max: usize) -> Result<u8> {
    if index == 0 || index > max {
        return Err(WireGuardError::AddressExhausted { kind, index, max });
    }
    Ok(index as u8)
}

/// Address of the `index`-th hub (1-based): `10.169.0.{index}/16`.
///
/// # Errors
///
/// Returns [`WireGuardError::AddressExhausted`] outside `1..=254`.
pub fn hub_address(index: usize) -> Result<Ipv4Address> {
    let octet = check_index("hub", index, MAX_HUBS)?;
    Ok(Ipv4Address {
        address: Ipv4Addr::new(10, 169, 0, octet),
        netmask: OVERLAY_PREFIX,
    })
}

/// Address of the `index`-th spoke (1-based): `10.169.{index}.1/16`.
///
/// # Errors
///
/// Returns [`WireGuardError::AddressExhausted`] outside `1..=255`.
pub fn spoke_address(index: usize) -> Result<Ipv4Address> {
    let octet = check_index("spoke", index, MAX_SPOKES)?;
    Ok(Ipv4Address {
        address: Ipv4Addr::new(10, 169, octet, 1),
        netmask: OVERLAY_PREFIX,
    })
}

/// Counter-based allocator for hub and spoke addresses.
///
/// Indices follow registration order and are never reused. Every issued
/// address is remembered; an address that was reserved up front or already
/// handed out is reported as [`WireGuardError::AddressInUse`] and the
/// counter does not advance.
#[derive(Debug, Clone, Default)]
pub struct AddressAllocator {
    hubs: usize,
    spokes: usize,
    issued: HashSet<Ipv4Addr>,
}

impl AddressAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that treats `reserved` as already taken.
    #[must_use]
    pub fn with_reserved(reserved: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            issued: reserved.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Allocates the next hub address.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub range is exhausted or the address is taken.
    pub fn next_hub(&mut self) -> Result<Ipv4Address> {
        let address = hub_address(self.hubs + 1)?;
        self.claim(address)?;
        self.hubs += 1;
        debug!(index = self.hubs, %address, "allocated hub address");
        Ok(address)
    }

    /// Allocates the next spoke address.
    ///
    /// # Errors
    ///
    /// Returns an error if the spoke range is exhausted or the address is taken.
    pub fn next_spoke(&mut self) -> Result<Ipv4Address> {
        let address = spoke_address(self.spokes + 1)?;
        self.claim(address)?;
        self.spokes += 1;
        debug!(index = self.spokes, %address, "allocated spoke address");
        Ok(address)
    }

    /// Number of hub addresses handed out so far.
    #[must_use]
    pub fn hubs_allocated(&self) -> usize {
        self.hubs
    }

    /// Number of spoke addresses handed out so far.
    #[must_use]
    pub fn spokes_allocated(&self) -> usize {
        self.spokes
    }

    fn claim(&mut self, address: Ipv4Address) -> Result<()> {
        if !self.issued.insert(address.address) {
            return Err(WireGuardError::AddressInUse(address.address));
        }
        Ok(())
    }
}
