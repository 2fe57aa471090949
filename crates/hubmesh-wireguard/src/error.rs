//! Error types for WireGuard key, address and config operations.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Result type alias for WireGuard operations.
pub type Result<T> = std::result::Result<T, WireGuardError>;

/// Which ASN.1 envelope a raw key was wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// `SubjectPublicKeyInfo` wrapping a public key.
    Spki,
    /// PKCS#8 `PrivateKeyInfo` wrapping a private key.
    Pkcs8,
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spki => write!(f, "SPKI"),
            Self::Pkcs8 => write!(f, "PKCS8"),
        }
    }
}

/// Errors that can occur during WireGuard operations.
#[derive(Debug, Error)]
pub enum WireGuardError {
    /// The key pair primitive could not produce key material.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// A DER envelope did not have the fixed size expected for X25519.
    #[error("unexpected {kind} envelope length: expected {expected} bytes, got {actual}")]
    EnvelopeLength {
        /// Envelope being unwrapped.
        kind: EnvelopeKind,
        /// Length the fixed layout requires.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// Invalid base64 encoding.
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(String),

    /// Invalid key length.
    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    /// Netmask outside `0..=32`.
    #[error("invalid netmask: {0}")]
    InvalidNetmask(String),

    /// Address string could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Allocation index falls outside the overlay range.
    #[error("{kind} address space exhausted: index {index} is outside 1..={max}")]
    AddressExhausted {
        /// `hub` or `spoke`.
        kind: &'static str,
        /// Requested 1-based index.
        index: usize,
        /// Largest index the range supports.
        max: usize,
    },

    /// Address was already issued or reserved.
    #[error("address {0} is already in use")]
    AddressInUse(Ipv4Addr),

    /// Config input is structurally incomplete.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<base64::DecodeError> for WireGuardError {
    fn from(err: base64::DecodeError) -> Self {
        Self::InvalidBase64(err.to_string())
    }
}
