//! Wire/disk encoding for node bytes (spec §6).
//!
//! `Codec<T>` is the engine's only dependency on a concrete serialization
//! format. The default implementation uses `bcs` — Aptos's own canonical
//! serialization format — because canonical (single valid encoding per
//! value) bytes are exactly what a Merkle-hashed structure needs: two
//! semantically equal nodes must hash identically.

use crate::error::{Result, TreeError};
use serde::{de::DeserializeOwned, Serialize};

pub trait Codec<T>: Send + Sync + 'static {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// `bcs`-backed codec for any `Serialize + DeserializeOwned` node type.
#[derive(Debug, Default, Clone, Copy)]
pub struct BcsCodec;

impl<T> Codec<T> for BcsCodec
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bcs::to_bytes(value).map_err(|e| TreeError::Codec(e.into()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bcs::from_bytes(bytes).map_err(|e| TreeError::Codec(e.into()))
    }
}
