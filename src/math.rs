//! Bin math for the discretized-liquidity pool.
//!
//! Bin `id` trades at `(1 + bin_step / 10_000)^id`, scaled by the decimal
//! difference between the two coins. Liquidity in a bin is valued in units of
//! coin B: `L = amount_a * price + amount_b`.

use serde::{Deserialize, Serialize};

use crate::{accounts::BinLiquidity, constants::BASIS_POINT_MAX, error::StrategyError};

/// Tolerance used when snapping a price onto the bin grid, so that a price
/// computed from bin `n` maps back to `n` despite float error.
const BIN_SNAP_EPSILON: f64 = 1e-9;

/// Per-bin amounts for a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinDeposit {
    pub bin_id: i32,
    pub amount_a: u64,
    pub amount_b: u64,
    pub liquidity_share: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPlan {
    pub bins: Vec<BinDeposit>,
    pub total_a: u64,
    pub total_b: u64,
}

/// Where a bin sits relative to the active bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinSide {
    Below,
    Active,
    Above,
}

impl BinSide {
    pub fn of(bin_id: i32, active_bin_id: i32) -> Self {
        match bin_id.cmp(&active_bin_id) {
            std::cmp::Ordering::Less => Self::Below,
            std::cmp::Ordering::Equal => Self::Active,
            std::cmp::Ordering::Greater => Self::Above,
        }
    }
}

/// A position's share in one bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinShare {
    pub bin_id: i32,
    pub share: u128,
    pub side: BinSide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinWithdrawal {
    pub bin_id: i32,
    pub liquidity_share: u128,
    pub side: BinSide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawPlan {
    pub bins: Vec<BinWithdrawal>,
    pub is_only_a: bool,
    /// Requested output, in base units of the withdrawn coin.
    pub amount: u64,
}

impl WithdrawPlan {
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

fn bin_base(bin_step: u16) -> f64 {
    1.0 + bin_step as f64 / BASIS_POINT_MAX as f64
}

fn decimals_factor(decimals_a: u8, decimals_b: u8) -> f64 {
    10f64.powi(decimals_a as i32 - decimals_b as i32)
}

/// Price of coin A in units of coin B for a bin, in human units.
pub fn price_from_bin_id(bin_id: i32, bin_step: u16, decimals_a: u8, decimals_b: u8) -> f64 {
    bin_base(bin_step).powi(bin_id) * decimals_factor(decimals_a, decimals_b)
}

/// Bin containing `price`. With `round_down` the lower neighbour is chosen when
/// the price falls between two bins, otherwise the upper one.
pub fn bin_id_from_price(
    price: f64,
    bin_step: u16,
    decimals_a: u8,
    decimals_b: u8,
    round_down: bool,
) -> Result<i32, StrategyError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(StrategyError::Math(format!("invalid price {price}")));
    }
    if bin_step == 0 {
        return Err(StrategyError::Math("bin step is zero".to_string()));
    }

    let raw = price / decimals_factor(decimals_a, decimals_b);
    let exact = raw.ln() / bin_base(bin_step).ln();
    let nearest = exact.round();
    let id = if (exact - nearest).abs() < BIN_SNAP_EPSILON {
        nearest
    } else if round_down {
        exact.floor()
    } else {
        exact.ceil()
    };

    if id < i32::MIN as f64 || id > i32::MAX as f64 {
        return Err(StrategyError::Math(format!("bin id out of range for price {price}")));
    }

    Ok(id as i32)
}

/// Splits a fixed single-sided amount across `lower_bin_id..=upper_bin_id`.
///
/// The fixed side is spread evenly with the remainder in the last bin; the
/// other side is zero. If the active bin is in range and already holds
/// liquidity, the share minted there is scaled to the existing supply.
pub fn calculate_deposit(
    amount: u64,
    fix_amount_a: bool,
    active_bin_id: i32,
    bin_step: u16,
    lower_bin_id: i32,
    upper_bin_id: i32,
    active_bin: Option<&BinLiquidity>,
) -> Result<DepositPlan, StrategyError> {
    if lower_bin_id > upper_bin_id {
        return Err(StrategyError::Math(format!(
            "inverted bin range {lower_bin_id}..={upper_bin_id}"
        )));
    }
    if amount == 0 {
        return Err(StrategyError::Math("deposit amount is zero".to_string()));
    }

    let bin_count = (upper_bin_id as i64 - lower_bin_id as i64 + 1) as u64;
    let per_bin = amount / bin_count;
    let remainder = amount % bin_count;

    let mut bins = Vec::with_capacity(bin_count as usize);
    for bin_id in lower_bin_id..=upper_bin_id {
        let mut fixed = per_bin;
        if bin_id == upper_bin_id {
            fixed += remainder;
        }
        let (amount_a, amount_b) = if fix_amount_a { (fixed, 0) } else { (0, fixed) };

        let price = price_from_bin_id(bin_id, bin_step, 0, 0);
        let mut liquidity_share = bin_value(amount_a, amount_b, price);

        if bin_id == active_bin_id
            && let Some(existing) = active_bin
            && existing.liquidity_supply > 0
        {
            let existing_value = bin_value(existing.amount_a, existing.amount_b, price);
            if existing_value > 0 {
                liquidity_share = mul_div_floor(existing.liquidity_supply, liquidity_share, existing_value)
                    .ok_or_else(|| {
                        StrategyError::Math(format!(
                            "liquidity share overflow in bin {bin_id} (supply {})",
                            existing.liquidity_supply
                        ))
                    })?;
            }
        }

        bins.push(BinDeposit {
            bin_id,
            amount_a,
            amount_b,
            liquidity_share,
        });
    }

    let (total_a, total_b) = if fix_amount_a { (amount, 0) } else { (0, amount) };

    Ok(DepositPlan {
        bins,
        total_a,
        total_b,
    })
}

/// `floor(a * b / denominator)` without forming the full product. Supplies
/// are Q64-scaled, so `a * b` alone overflows `u128` for ordinary deposits.
fn mul_div_floor(a: u128, b: u128, denominator: u128) -> Option<u128> {
    let quotient = a / denominator;
    let remainder = a % denominator;
    quotient
        .checked_mul(b)?
        .checked_add(remainder.checked_mul(b)? / denominator)
}

fn bin_value(amount_a: u64, amount_b: u64, price: f64) -> u128 {
    (amount_a as f64 * price).floor() as u128 + amount_b as u128
}

/// Expands a position's share vector, indexed from `lower_bin_id`, into
/// non-zero per-bin shares tagged by their side of the active bin.
pub fn decode_liquidity_shares(
    lower_bin_id: i32,
    shares: &[u128],
    active_bin_id: i32,
) -> Vec<BinShare> {
    shares
        .iter()
        .enumerate()
        .filter(|(_, share)| **share > 0)
        .map(|(offset, share)| {
            let bin_id = lower_bin_id + offset as i32;
            BinShare {
                bin_id,
                share: *share,
                side: BinSide::of(bin_id, active_bin_id),
            }
        })
        .collect()
}

/// Plans the removal of every share the position holds, returning only one
/// coin. The pool converts the other side at bin price.
pub fn calculate_withdrawal(
    shares: &[BinShare],
    active_bin_id: i32,
    is_only_a: bool,
    amount: u64,
) -> WithdrawPlan {
    let bins = shares
        .iter()
        .map(|share| BinWithdrawal {
            bin_id: share.bin_id,
            liquidity_share: share.share,
            side: BinSide::of(share.bin_id, active_bin_id),
        })
        .collect();

    WithdrawPlan {
        bins,
        is_only_a,
        amount,
    }
}
