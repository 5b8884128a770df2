//! Strategy error types.

use thiserror::Error;

use crate::state::Asset;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No pool found for {coin_a}/{coin_b} with bin step {bin_step}")]
    PoolNotFound {
        coin_a: String,
        coin_b: String,
        bin_step: u16,
    },

    #[error("Pool {0} is not initialized")]
    PoolNotInitialized(String),

    #[error("Insufficient {asset} balance to deposit at bin {bin_id}: {available}")]
    InsufficientBalance {
        asset: Asset,
        bin_id: i32,
        available: u64,
    },

    #[error("Opened position but no position id in transaction {digest}")]
    PositionIdNotFound { digest: String },

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Bin math error: {0}")]
    Math(String),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type StrategyResult<T> = Result<T, StrategyError>;
