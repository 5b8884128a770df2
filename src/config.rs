use std::{env, time::Duration};

use anyhow::{Context, anyhow};

use crate::{
    constants::{DEFAULT_BASE_FACTOR, DEFAULT_ERROR_BACKOFF, position_struct_type},
    error::StrategyError,
    state::Asset,
};

/// Strategy parameters, loaded once at startup.
///
/// Prices are expressed as asset A per asset B.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub upper_price: f64,
    pub lower_price: f64,
    pub coin_type_a: String,
    pub coin_type_b: String,
    /// Nominal position size in base units, used to size withdrawals.
    pub position_size: u64,
    pub bin_step: u16,
    pub base_factor: u32,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    /// Slippage tolerance as a fraction (0.01 = 1%).
    pub slippage: f64,
    pub pool_id: Option<String>,
    pub owner: String,
    pub dlmm_package_id: String,
    /// Held asset assumed when balances tie or cannot be read.
    pub default_asset: Asset,
}

impl StrategyConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let upper_price = required("UPPER_PRICE")?
            .parse::<f64>()
            .context("UPPER_PRICE")?;
        let lower_price = required("LOWER_PRICE")?
            .parse::<f64>()
            .context("LOWER_PRICE")?;

        let coin_type_a = required("COIN_TYPE_A")?;
        let coin_type_b = required("COIN_TYPE_B")?;

        let position_size = required("POSITION_SIZE")?
            .parse::<u64>()
            .context("POSITION_SIZE")?;

        let bin_step = required("BIN_STEP")?.parse::<u16>().context("BIN_STEP")?;

        let base_factor = lookup("BASE_FACTOR")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("BASE_FACTOR")?
            .unwrap_or(DEFAULT_BASE_FACTOR);

        let poll_interval = Duration::from_millis(
            required("POLL_INTERVAL_MS")?
                .parse::<u64>()
                .context("POLL_INTERVAL_MS")?,
        );

        let error_backoff = lookup("ERROR_BACKOFF_MS")
            .map(|v| v.parse::<u64>().map(Duration::from_millis))
            .transpose()
            .context("ERROR_BACKOFF_MS")?
            .unwrap_or(DEFAULT_ERROR_BACKOFF);

        let slippage = required("SLIPPAGE")?.parse::<f64>().context("SLIPPAGE")?;

        let pool_id = lookup("POOL_ID").filter(|v| !v.trim().is_empty());

        let owner = required("OWNER_ADDRESS")?;
        let dlmm_package_id = required("DLMM_PACKAGE_ID")?;

        let default_asset = lookup("DEFAULT_ASSET")
            .map(|v| v.parse::<Asset>())
            .transpose()?
            .unwrap_or(Asset::B);

        let config = Self {
            upper_price,
            lower_price,
            coin_type_a,
            coin_type_b,
            position_size,
            bin_step,
            base_factor,
            poll_interval,
            error_backoff,
            slippage,
            pool_id,
            owner,
            dlmm_package_id,
            default_asset,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |msg: String| Err(StrategyError::InvalidConfig(msg));

        if !self.lower_price.is_finite() || self.lower_price <= 0.0 {
            return invalid(format!("lower price must be positive, got {}", self.lower_price));
        }
        if !self.upper_price.is_finite() {
            return invalid(format!("upper price must be finite, got {}", self.upper_price));
        }
        if self.lower_price >= self.upper_price {
            return invalid(format!(
                "lower price {} must be below upper price {}",
                self.lower_price, self.upper_price
            ));
        }
        if self.bin_step == 0 {
            return invalid("bin step must be non-zero".to_string());
        }
        if self.poll_interval.is_zero() {
            return invalid("poll interval must be non-zero".to_string());
        }
        if !(0.0..1.0).contains(&self.slippage) {
            return invalid(format!("slippage must be in [0, 1), got {}", self.slippage));
        }
        if self.coin_type_a == self.coin_type_b {
            return invalid(format!("coin types must differ, both are {}", self.coin_type_a));
        }

        Ok(())
    }

    pub fn coin_type(&self, asset: Asset) -> &str {
        match asset {
            Asset::A => &self.coin_type_a,
            Asset::B => &self.coin_type_b,
        }
    }

    pub fn position_type(&self) -> String {
        position_struct_type(&self.dlmm_package_id)
    }

    /// Slippage expressed in basis points for payload builders.
    pub fn slippage_bps(&self) -> u32 {
        (self.slippage * 10_000.0).round() as u32
    }
}
