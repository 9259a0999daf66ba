//! Tree configuration (spec §6).

use crate::error::{Result, TreeError};

/// Recognized configuration options.
///
/// `arity` bounds the maximum number of children/entries a node may carry
/// (`MaxDegree`); `alpha` derives the minimum non-root fill (`MinDegree`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    arity: u32,
    alpha: f64,
    assert_key_order: bool,
}

impl Config {
    /// Build a validated configuration.
    ///
    /// `arity` must be at least 4 (a branch that splits needs room for both
    /// halves to stay non-trivial); `alpha` must lie in `(0.0, 0.5]`.
    pub fn new(arity: u32, alpha: f64) -> Result<Self> {
        if arity < 4 {
            return Err(TreeError::InvalidConfig(format!(
                "arity must be >= 4, got {arity}"
            )));
        }
        if !(alpha > 0.0 && alpha <= 0.5) {
            return Err(TreeError::InvalidConfig(format!(
                "alpha must be in (0, 0.5], got {alpha}"
            )));
        }
        Ok(Self {
            arity,
            alpha,
            assert_key_order: false,
        })
    }

    /// Enable or disable the `assertions.isKeyOrderRequired` check.
    #[must_use]
    pub fn with_key_order_assertion(mut self, required: bool) -> Self {
        self.assert_key_order = required;
        self
    }

    /// `MaxDegree`: maximum children (branch) or entries (leaf) per node.
    pub fn max_degree(&self) -> usize {
        self.arity as usize
    }

    /// `MinDegree`: minimum fill for any non-root node.
    pub fn min_degree(&self) -> usize {
        (self.alpha * self.arity as f64).floor() as usize
    }

    pub fn assert_key_order(&self) -> bool {
        self.assert_key_order
    }

    /// Read `AUTH_BTREE_ARITY` / `AUTH_BTREE_ALPHA` / `AUTH_BTREE_ASSERT_KEY_ORDER`
    /// from the environment, falling back to `(arity=16, alpha=0.25)` when unset.
    ///
    /// This is the engine's only environment surface; there is no CLI or
    /// wire-protocol configuration at this layer (spec §6).
    pub fn from_env() -> Result<Self> {
        let arity = std::env::var("AUTH_BTREE_ARITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(16);
        let alpha = std::env::var("AUTH_BTREE_ALPHA")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.25);
        let assert_key_order = std::env::var("AUTH_BTREE_ASSERT_KEY_ORDER")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self::new(arity, alpha)?.with_key_order_assertion(assert_key_order))
    }
}
