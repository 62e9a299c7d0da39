//! Per-layer TTL strategy

use crate::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy mapping `(layer_index, base_ttl)` to a per-layer TTL
///
/// Layer 0 is the fastest layer. The same strategy is applied on the `set`
/// fan-out and on warm-up writes, so a value carries consistent lifetimes
/// however it entered a layer. A TTL of `None` (or zero) always means "use
/// the backend default" and is passed through unscaled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum TtlStrategy {
    /// Every layer receives the base TTL
    #[default]
    Uniform,
    /// Layer `i` of `n` receives `base · factor^(n-1-i)`, so the slowest
    /// layer retains the full TTL and faster layers expire sooner
    Decaying {
        /// Decay factor, must be in `(0, 1)`
        factor: f64,
    },
    /// Explicit per-layer table; indices beyond the table fall back to the
    /// base TTL
    Custom(Vec<Duration>),
}

impl TtlStrategy {
    /// Decaying strategy with the given factor
    pub fn decaying(factor: f64) -> Self {
        TtlStrategy::Decaying { factor }
    }

    /// Explicit per-layer TTL table
    pub fn custom(table: impl Into<Vec<Duration>>) -> Self {
        TtlStrategy::Custom(table.into())
    }

    /// Validate construction-time parameters
    pub fn validate(&self) -> Result<()> {
        if let TtlStrategy::Decaying { factor } = self {
            if !(*factor > 0.0 && *factor < 1.0) {
                return Err(CacheError::Configuration(format!(
                    "decay factor must be in (0, 1), got {factor}"
                )));
            }
        }
        Ok(())
    }

    /// Compute the TTL for `layer_index` in a chain of `chain_len` layers
    pub fn ttl_for(
        &self,
        layer_index: usize,
        chain_len: usize,
        base: Option<Duration>,
    ) -> Option<Duration> {
        match self {
            TtlStrategy::Uniform => base,
            TtlStrategy::Decaying { factor } => base.map(|ttl| {
                // With a single layer (or an unknown chain length) the
                // exponent collapses to zero and the base TTL passes through.
                let exponent = chain_len.saturating_sub(1).saturating_sub(layer_index);
                ttl.mul_f64(factor.powi(exponent as i32))
            }),
            TtlStrategy::Custom(table) => match table.get(layer_index) {
                Some(ttl) => Some(*ttl),
                None => base,
            },
        }
    }
}
