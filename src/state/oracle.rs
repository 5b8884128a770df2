//! Pool price as seen from the active bin.

use tracing::{debug, warn};

use crate::{
    accounts::ObjectId,
    client::DlmmSdk,
    constants::{NEUTRAL_PRICE, PRICE_PRECISION, TOKEN_DECIMALS},
    error::StrategyResult,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceReading {
    /// Asset A per asset B, rounded to six decimals.
    pub price: f64,
    pub active_bin_id: Option<i32>,
    /// True when the pool could not be read and `price` is the neutral default.
    pub is_fallback: bool,
}

impl PriceReading {
    pub fn neutral() -> Self {
        Self {
            price: NEUTRAL_PRICE,
            active_bin_id: None,
            is_fallback: true,
        }
    }
}

/// Current pool price. Read failures yield [`PriceReading::neutral`].
pub async fn read_price<S: DlmmSdk + ?Sized>(sdk: &S, pool_id: &ObjectId) -> PriceReading {
    let pool = match sdk.get_pool(pool_id).await {
        Ok(pool) => pool,
        Err(e) => {
            warn!(pool = %pool_id, error = %e, "Price read failed, using neutral price");
            return PriceReading::neutral();
        }
    };

    let raw = sdk.price_from_bin_id(pool.active_bin_id, pool.bin_step, TOKEN_DECIMALS, TOKEN_DECIMALS);
    if !raw.is_finite() || raw <= 0.0 {
        warn!(pool = %pool_id, active_bin = pool.active_bin_id, "Invalid bin price, using neutral price");
        return PriceReading::neutral();
    }

    let price = (raw * PRICE_PRECISION).round() / PRICE_PRECISION;
    debug!(price, active_bin = pool.active_bin_id, bin_step = pool.bin_step, "Pool price");

    PriceReading {
        price,
        active_bin_id: Some(pool.active_bin_id),
        is_fallback: false,
    }
}

/// Bin that a threshold price maps to, rounding toward the lower bin.
pub fn target_bin_for_price<S: DlmmSdk + ?Sized>(
    sdk: &S,
    price: f64,
    bin_step: u16,
) -> StrategyResult<i32> {
    sdk.bin_id_from_price(price, bin_step, TOKEN_DECIMALS, TOKEN_DECIMALS, true)
}
