use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// High bit marking an identifier as a blob.
const BLOB_BIT: u64 = 1 << 63;

/// Opaque identifier for any object held by a store.
///
/// Identifiers are minted by the store when an object is created and stay
/// valid across process boundaries. Blob identifiers carry the high bit so
/// that a reader can tell raw buffers from metadata objects without a lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Mint a fresh, non-null identifier for a metadata object.
    pub fn generate() -> Self {
        let raw = rand::random::<u64>() & !BLOB_BIT;
        Self(raw.max(1))
    }

    /// Mint a fresh identifier for a blob.
    pub fn generate_blob() -> Self {
        Self(rand::random::<u64>() | BLOB_BIT)
    }

    /// Create an `ObjectId` from its raw representation.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The null object ID (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self(0)
    }

    /// Returns `true` if this is the null object ID.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if this identifier names a blob.
    pub fn is_blob(&self) -> bool {
        self.0 & BLOB_BIT != 0
    }

    /// The raw 64-bit value.
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Hex-encoded string representation (16 characters, no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    /// Parse from a hex string, with or without the leading `o`.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix('o').unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 8,
                actual: bytes.len(),
            })?;
        Ok(Self(u64::from_be_bytes(arr)))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Content checksum of a blob: the first eight bytes of its BLAKE3 hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(u64);

impl Signature {
    /// Compute the signature of a byte buffer.
    pub fn of(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        Self(u64::from_le_bytes(head))
    }

    /// Returns `true` if `data` produces this signature.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{:016x}", self.0)
    }
}

/// Identifier of the store instance that created an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_ids_are_not_null() {
        for _ in 0..64 {
            assert!(!ObjectId::generate().is_null());
            assert!(!ObjectId::generate_blob().is_null());
        }
    }

    #[test]
    fn blob_bit_distinguishes_kinds() {
        assert!(ObjectId::generate_blob().is_blob());
        assert!(!ObjectId::generate().is_blob());
    }

    #[test]
    fn null_is_zero() {
        let null = ObjectId::null();
        assert!(null.is_null());
        assert_eq!(null.as_raw(), 0);
    }

    #[test]
    fn display_has_prefix_and_fixed_width() {
        let id = ObjectId::from_raw(0x2ec13bc81226);
        assert_eq!(id.to_string(), "o00002ec13bc81226");
        assert_eq!(format!("{id:?}"), "ObjectId(o00002ec13bc81226)");
    }

    #[test]
    fn from_hex_accepts_optional_prefix() {
        let id = ObjectId::from_raw(42);
        assert_eq!(ObjectId::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!("o000000000000002a".parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(matches!(
            ObjectId::from_hex("xyz"),
            Err(TypeError::InvalidHex(_))
        ));
        assert_eq!(
            ObjectId::from_hex("abcd"),
            Err(TypeError::InvalidLength {
                expected: 8,
                actual: 2
            })
        );
    }

    #[test]
    fn signature_detects_tampering() {
        let sig = Signature::of(b"payload");
        assert!(sig.verify(b"payload"));
        assert!(!sig.verify(b"payl0ad"));
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    proptest! {
        #[test]
        fn display_parses_back(raw in any::<u64>()) {
            let id = ObjectId::from_raw(raw);
            prop_assert_eq!(id.to_string().parse::<ObjectId>().unwrap(), id);
        }
    }
}
