pub mod balances;
pub mod fetchers;
pub mod oracle;
pub mod registry;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{accounts::ObjectId, error::StrategyError};

pub use balances::{fetch_balances, resolve_initial_asset};
pub use fetchers::{fetch_active_bin, fetch_pool, fetch_position};
pub use oracle::{PriceReading, read_price, target_bin_for_price};
pub use registry::{discover_positions, resolve_bin_range};

/// One side of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    A,
    B,
}

impl Asset {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn is_a(self) -> bool {
        matches!(self, Self::A)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

impl FromStr for Asset {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            other => Err(StrategyError::InvalidConfig(format!(
                "asset must be A or B, got {other}"
            ))),
        }
    }
}

/// Wallet balances of both coins, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balances {
    pub a: u64,
    pub b: u64,
}

impl Balances {
    pub fn of(&self, asset: Asset) -> u64 {
        match asset {
            Asset::A => self.a,
            Asset::B => self.b,
        }
    }

    /// Combined value assuming the two stablecoins trade at parity.
    pub fn combined(&self) -> u128 {
        self.a as u128 + self.b as u128
    }
}

/// Placement still owed after a withdrawal went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPlacement {
    pub deposit: Asset,
    pub bin_id: i32,
}

/// Mutable strategy state. Owned by the controller, which is its only writer.
#[derive(Debug, Clone)]
pub struct PositionState {
    /// Asset the capital is currently denominated in.
    pub current_token: Asset,
    pub current_position_id: Option<ObjectId>,
    pub current_bin_id: Option<i32>,
    pub last_action_at: Option<DateTime<Utc>>,
    /// Advisory running profit in base units.
    pub cumulative_profit: i128,
    pub balances: Option<Balances>,
    /// Wallet value right before the last placement, for the profit counter.
    pub value_before_placement: Option<u128>,
    pub pending: Option<PendingPlacement>,
}

impl PositionState {
    pub fn new(default_asset: Asset) -> Self {
        Self {
            current_token: default_asset,
            current_position_id: None,
            current_bin_id: None,
            last_action_at: None,
            cumulative_profit: 0,
            balances: None,
            value_before_placement: None,
            pending: None,
        }
    }

    pub fn has_position(&self) -> bool {
        self.current_position_id.is_some()
    }

    pub fn open_position(&mut self, position_id: ObjectId, bin_id: i32) {
        self.current_position_id = Some(position_id);
        self.current_bin_id = Some(bin_id);
        self.touch();
    }

    pub fn close_position(&mut self) {
        self.current_position_id = None;
        self.current_bin_id = None;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_action_at = Some(Utc::now());
    }
}
