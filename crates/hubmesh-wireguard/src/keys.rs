//! `WireGuard` key types and key material generation.
//!
//! `WireGuard` uses Curve25519 for key exchange. Keys are 32 bytes.
//!
//! Key pairs come out of a [`KeySource`] as DER envelopes (SPKI for the
//! public half, PKCS#8 for the private half). [`KeyMaterialProvider`] strips
//! the fixed-size X25519 envelope prefixes by offset and refuses any envelope
//! whose total length differs from the layout it assumes.

use std::fmt;

use base64::Engine;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use tracing::debug;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{EnvelopeKind, Result, WireGuardError};

/// `WireGuard` key size in bytes (256-bit Curve25519 keys).
pub const KEY_SIZE: usize = 32;

/// Length of the SPKI header preceding a raw X25519 public key.
pub const SPKI_PREFIX_LEN: usize = 12;

/// Length of the PKCS#8 header preceding a raw X25519 private key.
pub const PKCS8_PREFIX_LEN: usize = 16;

// SEQUENCE { SEQUENCE { OID 1.3.101.110 } BIT STRING (0 unused bits) }
const X25519_SPKI_PREFIX: [u8; SPKI_PREFIX_LEN] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
];

// SEQUENCE { INTEGER 0, SEQUENCE { OID 1.3.101.110 }, OCTET STRING { OCTET STRING } }
const X25519_PKCS8_PREFIX: [u8; PKCS8_PREFIX_LEN] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x04, 0x22, 0x04, 0x20,
];

fn copy_key(bytes: &[u8]) -> Result<[u8; KEY_SIZE]> {
    if bytes.len() != KEY_SIZE {
        return Err(WireGuardError::InvalidKeyLength(bytes.len()));
    }
    let mut arr = [0u8; KEY_SIZE];
    arr.copy_from_slice(bytes);
    Ok(arr)
}

fn decode_base64(s: &str) -> Result<Vec<u8>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(s)?)
}

/// A `WireGuard` public key (Curve25519, 32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Creates a public key from raw bytes.
    #[must_use]
    pub const fn from_bytes_array(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a public key from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        copy_key(bytes).map(Self)
    }

    /// Returns the raw bytes of the public key.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Encodes the key as base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Decodes a public key from base64.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid base64 or wrong length.
    pub fn from_base64(s: &str) -> Result<Self> {
        Self::from_bytes(&decode_base64(s)?)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = self.to_base64();
        let short = &b64[..8.min(b64.len())];
        write!(f, "PublicKey({short}...)")
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

impl From<X25519PublicKey> for PublicKey {
    fn from(key: X25519PublicKey) -> Self {
        Self::from_bytes_array(*key.as_bytes())
    }
}

/// A `WireGuard` private key (Curve25519, 32 bytes).
#[derive(Clone)]
pub struct PrivateKey([u8; KEY_SIZE]);

impl PrivateKey {
    /// Creates a private key from a 32-byte array.
    #[must_use]
    pub const fn from_bytes_array(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a private key from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        copy_key(bytes).map(Self)
    }

    /// Returns the raw bytes of the private key.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Derives the corresponding public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(self.0);
        PublicKey::from(X25519PublicKey::from(&secret))
    }

    /// Encodes the key as base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Decodes a private key from base64.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid base64 or wrong length.
    pub fn from_base64(s: &str) -> Result<Self> {
        Self::from_bytes(&decode_base64(s)?)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for PrivateKey {}

impl Serialize for PrivateKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// A `WireGuard` key pair (private + public).
///
/// Serializes as `{"publicKey": "...", "privateKey": "..."}` with both halves
/// base64-encoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    public_key: PublicKey,
    private_key: PrivateKey,
}

impl KeyPair {
    /// Creates a key pair from an existing private key.
    #[must_use]
    pub fn from_private_key(private: PrivateKey) -> Self {
        let public_key = private.public_key();
        Self {
            public_key,
            private_key: private,
        }
    }

    /// Returns a reference to the private key.
    #[must_use]
    pub const fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Returns a reference to the public key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"[REDACTED]")
            .field("public", &self.public_key)
            .finish()
    }
}

/// A key pair as emitted by a key-agreement primitive: DER-encoded
/// `SubjectPublicKeyInfo` and PKCS#8 `PrivateKeyInfo`.
#[derive(Clone)]
pub struct DerKeyPair {
    /// SPKI-wrapped public key.
    pub spki: Vec<u8>,
    /// PKCS#8-wrapped private key.
    pub pkcs8: Vec<u8>,
}

impl fmt::Debug for DerKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerKeyPair")
            .field("spki_len", &self.spki.len())
            .field("pkcs8_len", &self.pkcs8.len())
            .finish()
    }
}

/// Capability that produces fresh X25519 key pairs in DER envelopes.
pub trait KeySource: Send + Sync {
    /// Generates one key pair.
    ///
    /// # Errors
    ///
    /// Returns [`WireGuardError::KeyGeneration`] if no key can be produced.
    fn generate_der(&self) -> Result<DerKeyPair>;
}

/// [`KeySource`] backed by `x25519-dalek` and the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519Source;

impl KeySource for X25519Source {
    fn generate_der(&self) -> Result<DerKeyPair> {
        let mut seed = [0u8; KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| WireGuardError::KeyGeneration(e.to_string()))?;

        // Clamp the scalar the same way `wg genkey` does.
        seed[0] &= 248;
        seed[31] &= 127;
        seed[31] |= 64;

        let secret = StaticSecret::from(seed);
        let public = X25519PublicKey::from(&secret);

        let mut spki = X25519_SPKI_PREFIX.to_vec();
        spki.extend_from_slice(public.as_bytes());
        let mut pkcs8 = X25519_PKCS8_PREFIX.to_vec();
        pkcs8.extend_from_slice(&secret.to_bytes());

        Ok(DerKeyPair { spki, pkcs8 })
    }
}

fn strip_envelope(der: &[u8], kind: EnvelopeKind) -> Result<[u8; KEY_SIZE]> {
    let prefix = match kind {
        EnvelopeKind::Spki => SPKI_PREFIX_LEN,
        EnvelopeKind::Pkcs8 => PKCS8_PREFIX_LEN,
    };
    let expected = prefix + KEY_SIZE;
    if der.len() != expected {
        return Err(WireGuardError::EnvelopeLength {
            kind,
            expected,
            actual: der.len(),
        });
    }
    copy_key(&der[prefix..])
}

/// Extracts the raw 32-byte public key from an X25519 SPKI envelope.
///
/// # Errors
///
/// Returns [`WireGuardError::EnvelopeLength`] unless the envelope is exactly
/// 44 bytes.
pub fn unwrap_spki(der: &[u8]) -> Result<PublicKey> {
    strip_envelope(der, EnvelopeKind::Spki).map(PublicKey)
}

/// Extracts the raw 32-byte private key from an X25519 PKCS#8 envelope.
///
/// # Errors
///
/// Returns [`WireGuardError::EnvelopeLength`] unless the envelope is exactly
/// 48 bytes.
pub fn unwrap_pkcs8(der: &[u8]) -> Result<PrivateKey> {
    strip_envelope(der, EnvelopeKind::Pkcs8).map(PrivateKey)
}

/// Generates `WireGuard` key pairs from a [`KeySource`].
pub struct KeyMaterialProvider {
    source: Box<dyn KeySource>,
}

impl KeyMaterialProvider {
    /// Creates a provider over the given source.
    #[must_use]
    pub fn new(source: impl KeySource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Generates a new key pair.
    ///
    /// Failures are not retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or returns an envelope of an
    /// unexpected size.
    pub fn generate(&self) -> Result<KeyPair> {
        let der = self.source.generate_der()?;
        let public_key = unwrap_spki(&der.spki)?;
        let private_key = unwrap_pkcs8(&der.pkcs8)?;
        debug!(public_key = %public_key, "generated key pair");
        Ok(KeyPair {
            public_key,
            private_key,
        })
    }
}

impl Default for KeyMaterialProvider {
    fn default() -> Self {
        Self::new(X25519Source)
    }
}

impl fmt::Debug for KeyMaterialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterialProvider").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(DerKeyPair);

    impl KeySource for FixedSource {
        fn generate_der(&self) -> Result<DerKeyPair> {
            Ok(self.0.clone())
        }
    }

    struct NoEntropy;

    impl KeySource for NoEntropy {
        fn generate_der(&self) -> Result<DerKeyPair> {
            Err(WireGuardError::KeyGeneration("no entropy source".into()))
        }
    }

    #[test]
    fn generated_keys_decode_to_32_bytes() {
        let pair = KeyMaterialProvider::default().generate().expect("generate");
        let engine = base64::engine::general_purpose::STANDARD;
        let public = engine.decode(pair.public_key().to_base64()).expect("b64");
        let private = engine.decode(pair.private_key().to_base64()).expect("b64");
        assert_eq!(public.len(), KEY_SIZE);
        assert_eq!(private.len(), KEY_SIZE);
    }

    #[test]
    fn generated_public_key_matches_private_key() {
        let pair = KeyMaterialProvider::default().generate().expect("generate");
        assert_eq!(pair.private_key().public_key(), *pair.public_key());
    }

    #[test]
    fn generated_private_key_is_clamped() {
        let pair = KeyMaterialProvider::default().generate().expect("generate");
        let bytes = pair.private_key().as_bytes();
        assert_eq!(bytes[0] & 7, 0);
        assert_eq!(bytes[31] & 128, 0);
        assert_eq!(bytes[31] & 64, 64);
    }

    #[test]
    fn successive_generations_differ() {
        let provider = KeyMaterialProvider::default();
        let a = provider.generate().expect("generate");
        let b = provider.generate().expect("generate");
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn x25519_source_emits_fixed_envelopes() {
        let der = X25519Source.generate_der().expect("generate");
        assert_eq!(der.spki.len(), 44);
        assert_eq!(der.pkcs8.len(), 48);
        assert_eq!(&der.spki[..SPKI_PREFIX_LEN], &X25519_SPKI_PREFIX);
        assert_eq!(&der.pkcs8[..PKCS8_PREFIX_LEN], &X25519_PKCS8_PREFIX);
    }

    #[test]
    fn strips_exact_offsets() {
        let mut spki = vec![0xAA; SPKI_PREFIX_LEN];
        spki.extend_from_slice(&[7u8; KEY_SIZE]);
        let mut pkcs8 = vec![0xBB; PKCS8_PREFIX_LEN];
        pkcs8.extend_from_slice(&[9u8; KEY_SIZE]);

        let provider = KeyMaterialProvider::new(FixedSource(DerKeyPair { spki, pkcs8 }));
        let pair = provider.generate().expect("generate");
        assert_eq!(pair.public_key().as_bytes(), &[7u8; KEY_SIZE]);
        assert_eq!(pair.private_key().as_bytes(), &[9u8; KEY_SIZE]);
    }

    #[test]
    fn oversized_spki_is_rejected() {
        let der = DerKeyPair {
            spki: vec![0; 45],
            pkcs8: vec![0; 48],
        };
        let err = KeyMaterialProvider::new(FixedSource(der))
            .generate()
            .expect_err("must fail");
        assert!(matches!(
            err,
            WireGuardError::EnvelopeLength {
                kind: EnvelopeKind::Spki,
                expected: 44,
                actual: 45
            }
        ));
    }

    #[test]
    fn truncated_pkcs8_is_rejected() {
        let der = DerKeyPair {
            spki: vec![0; 44],
            pkcs8: vec![0; 40],
        };
        let err = KeyMaterialProvider::new(FixedSource(der))
            .generate()
            .expect_err("must fail");
        assert!(matches!(
            err,
            WireGuardError::EnvelopeLength {
                kind: EnvelopeKind::Pkcs8,
                ..
            }
        ));
    }

    #[test]
    fn source_failure_is_surfaced() {
        let err = KeyMaterialProvider::new(NoEntropy)
            .generate()
            .expect_err("must fail");
        assert!(matches!(err, WireGuardError::KeyGeneration(_)));
    }

    #[test]
    fn private_key_debug_redacts() {
        let pair = KeyMaterialProvider::default().generate().expect("generate");
        assert!(format!("{:?}", pair.private_key()).contains("REDACTED"));
        assert!(format!("{pair:?}").contains("REDACTED"));
    }

    #[test]
    fn keypair_serializes_camel_case_base64() {
        let pair = KeyPair::from_private_key(PrivateKey::from_bytes_array([3u8; KEY_SIZE]));
        let json = serde_json::to_value(&pair).expect("serialize");
        assert_eq!(json["privateKey"], pair.private_key().to_base64());
        assert_eq!(json["publicKey"], pair.public_key().to_base64());
    }

    #[test]
    fn invalid_key_length_rejected() {
        let short_bytes = [0u8; 16];
        assert!(PrivateKey::from_bytes(&short_bytes).is_err());
        assert!(PublicKey::from_bytes(&short_bytes).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_wrong_length_envelope_fails(len in 0usize..128) {
                prop_assume!(len != SPKI_PREFIX_LEN + KEY_SIZE);
                prop_assert!(unwrap_spki(&vec![0u8; len]).is_err());
            }

            #[test]
            fn public_key_base64_decodes(bytes in prop::array::uniform32(any::<u8>())) {
                let public = PublicKey::from_bytes_array(bytes);
                let decoded = PublicKey::from_base64(&public.to_base64());
                prop_assert_eq!(decoded.ok(), Some(public));
            }
        }
    }
}
