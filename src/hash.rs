//! Hashes (spec §3, §6).
//!
//! The engine treats `Hash` as an opaque byte string and never interprets
//! its contents; only the `Hasher` implementation knows how bytes become a
//! hash.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque digest. Equality is byte equality; `empty()` is the
/// distinguished "no hash yet" value used for a fresh empty leaf.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Hash(Vec<u8>);

impl Hash {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(&self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Deterministic, collision-resistant, stateless hash function (spec §6).
///
/// Called only from node operations; the traversal and logical-put layers
/// never hash anything themselves.
pub trait Hasher: Send + Sync + 'static {
    fn hash(&self, bytes: &[u8]) -> Hash;

    /// Hash the concatenation of several byte strings without an
    /// intermediate allocation per call site; used for the checksum rule
    /// in spec §4.1 (`hasher(concat(kvChecksums))` / `hasher(concat(childHashes))`).
    fn hash_concat<'a, I: IntoIterator<Item = &'a [u8]>>(&self, parts: I) -> Hash
    where
        Self: Sized,
    {
        let mut buf = Vec::new();
        for part in parts {
            buf.extend_from_slice(part);
        }
        self.hash(&buf)
    }
}

/// Same behavior as `Hasher::hash_concat`, usable through a `&dyn Hasher`
/// (the trait method itself requires `Self: Sized` to stay dyn compatible).
pub fn hash_concat_dyn<'a>(hasher: &dyn Hasher, parts: impl IntoIterator<Item = &'a [u8]>) -> Hash {
    let mut buf = Vec::new();
    for part in parts {
        buf.extend_from_slice(part);
    }
    hasher.hash(&buf)
}

/// Default hasher: SHA3-256, the digest family `aptos-crypto` itself is
/// built on.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha3Hasher;

impl Hasher for Sha3Hasher {
    fn hash(&self, bytes: &[u8]) -> Hash {
        use sha3::{Digest, Sha3_256};
        let mut hasher = Sha3_256::new();
        hasher.update(bytes);
        Hash(hasher.finalize().to_vec())
    }
}
