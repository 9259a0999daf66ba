//! An authenticated, order-preserving B+Tree.
//!
//! The engine performs every structural operation — traversal, split,
//! rebalance, persistence — while remaining agnostic to key ordering: a
//! [`command::ReadCommand`] or [`command::WriteCommand`] supplied by the
//! caller decides which child to descend into and where a key belongs.
//! Every mutation returns a [`proof::MerklePath`] the caller can verify
//! against a previously trusted root hash.
//!
//! ```text
//! Node model (node) -> Persistence (store) -> Command protocol (command)
//!   -> Traversal (engine) -> Logical put (logical_put)
//! ```

pub mod codec;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod hash;
pub mod ids;
pub mod key;
pub mod logical_put;
pub mod node;
pub mod proof;
pub mod range;
pub mod store;
pub mod trail;

pub use config::Config;
pub use engine::Tree;
pub use error::{Result, TreeError};
pub use hash::{Hash, Hasher, Sha3Hasher};
pub use ids::{NodeId, ValueRef, ROOT_ID};
pub use key::Key;
