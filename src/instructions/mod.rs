//! Liquidity actions: payload builders and the placement and withdrawal engines.

pub mod add_liquidity;
pub mod builders;
pub mod remove_liquidity;

pub use add_liquidity::{PlacementOutcome, place_liquidity};
pub use builders::*;
pub use remove_liquidity::{WithdrawalOutcome, collect_fees_best_effort, withdraw_liquidity};
