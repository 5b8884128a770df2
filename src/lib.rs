pub mod accounts;
pub mod client;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod instructions;
pub mod math;
pub mod state;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use accounts::{ObjectId, PoolState, PositionInfo, extract_position_id, resolve_pool_address};
pub use client::{ChainClient, DlmmSdk, TransactionRequest, TxOutcome};
pub use config::StrategyConfig;
pub use constants::*;
pub use controller::{PollOutcome, RebalanceController, StopHandle, Transition, evaluate_transition};
pub use error::{StrategyError, StrategyResult};
pub use instructions::*;
pub use state::{Asset, Balances, PendingPlacement, PositionState, PriceReading};
