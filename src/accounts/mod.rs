//! On-chain object types read from the DLMM package.
//!
//! This module provides:
//! - Snapshots of pool, position and bin objects
//! - Pool address and position id resolution

pub mod resolvers;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use resolvers::*;

/// Hex address of an on-chain object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Reward token accrued by positions in a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDescriptor {
    pub coin_type: String,
}

/// Pool snapshot. Always re-fetched before a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolState {
    pub id: ObjectId,
    pub coin_type_a: String,
    pub coin_type_b: String,
    pub active_bin_id: i32,
    pub bin_step: u16,
    /// Table holding per-bin reserves.
    pub bin_manager: ObjectId,
    pub rewards: Vec<RewardDescriptor>,
}

impl PoolState {
    /// A pool with a zero bin step has not been initialized by the factory.
    pub fn is_initialized(&self) -> bool {
        self.bin_step > 0
    }
}

/// Position snapshot. Re-fetched before every withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionInfo {
    pub id: ObjectId,
    pub pool_id: ObjectId,
    pub lower_bin_id: i32,
    pub upper_bin_id: i32,
    /// Liquidity shares, one entry per bin starting at `lower_bin_id`.
    pub liquidity_shares: Vec<u128>,
}

impl PositionInfo {
    pub fn has_liquidity(&self) -> bool {
        self.liquidity_shares.iter().any(|share| *share > 0)
    }
}

/// Reserves and share supply of a single bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinLiquidity {
    pub bin_id: i32,
    pub amount_a: u64,
    pub amount_b: u64,
    pub liquidity_supply: u128,
}
