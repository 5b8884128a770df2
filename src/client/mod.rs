//! Collaborator interfaces for the DLMM package and the chain.
//!
//! The strategy only talks to the chain through these traits. JSON-RPC
//! implementations live in [`rpc`] and [`dlmm`].

pub mod dlmm;
pub mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    accounts::{BinLiquidity, ObjectId, PoolState, PositionInfo},
    error::StrategyError,
    math::{self, BinShare, BinWithdrawal, DepositPlan, WithdrawPlan},
};

pub use dlmm::RpcDlmmSdk;
pub use rpc::SuiRpcClient;

/// Reads from the DLMM package plus its bin math.
#[async_trait]
pub trait DlmmSdk: Send + Sync {
    /// Pool for a coin pair, bin step and base factor, if one exists.
    async fn find_pool_address(
        &self,
        coin_type_a: &str,
        coin_type_b: &str,
        bin_step: u16,
        base_factor: u32,
    ) -> anyhow::Result<Option<ObjectId>>;

    async fn get_pool(&self, pool_id: &ObjectId) -> anyhow::Result<PoolState>;

    /// `None` when the position object no longer exists.
    async fn get_position(&self, position_id: &ObjectId) -> anyhow::Result<Option<PositionInfo>>;

    /// Reserves of one bin. `None` when the bin holds no liquidity.
    async fn get_bin_liquidity(
        &self,
        pool: &PoolState,
        bin_id: i32,
    ) -> anyhow::Result<Option<BinLiquidity>>;

    fn price_from_bin_id(&self, bin_id: i32, bin_step: u16, decimals_a: u8, decimals_b: u8) -> f64 {
        math::price_from_bin_id(bin_id, bin_step, decimals_a, decimals_b)
    }

    fn bin_id_from_price(
        &self,
        price: f64,
        bin_step: u16,
        decimals_a: u8,
        decimals_b: u8,
        round_down: bool,
    ) -> Result<i32, StrategyError> {
        math::bin_id_from_price(price, bin_step, decimals_a, decimals_b, round_down)
    }

    #[allow(clippy::too_many_arguments)]
    fn calculate_deposit(
        &self,
        amount: u64,
        fix_amount_a: bool,
        active_bin_id: i32,
        bin_step: u16,
        lower_bin_id: i32,
        upper_bin_id: i32,
        active_bin: Option<&BinLiquidity>,
    ) -> Result<DepositPlan, StrategyError> {
        math::calculate_deposit(
            amount,
            fix_amount_a,
            active_bin_id,
            bin_step,
            lower_bin_id,
            upper_bin_id,
            active_bin,
        )
    }

    fn calculate_withdrawal(
        &self,
        shares: &[BinShare],
        active_bin_id: i32,
        is_only_a: bool,
        amount: u64,
    ) -> WithdrawPlan {
        math::calculate_withdrawal(shares, active_bin_id, is_only_a, amount)
    }
}

/// Balance and object queries plus transaction execution.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(&self, owner: &str, coin_type: &str) -> anyhow::Result<u64>;

    /// Ids of objects owned by `owner` whose type is `struct_type`.
    async fn get_owned_objects(&self, owner: &str, struct_type: &str)
    -> anyhow::Result<Vec<ObjectId>>;

    /// Signs, submits and waits for the transaction. Errors when the
    /// transaction does not succeed on-chain.
    async fn execute(&self, request: &TransactionRequest) -> anyhow::Result<TxOutcome>;
}

/// Move call requested from the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub package_id: String,
    pub sender: String,
    #[serde(flatten)]
    pub payload: TxPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TxPayload {
    OpenPosition {
        pool: ObjectId,
        coin_type_a: String,
        coin_type_b: String,
        lower_bin_id: i32,
        upper_bin_id: i32,
        plan: DepositPlan,
        slippage_bps: u32,
    },
    AddLiquidity {
        pool: ObjectId,
        position: ObjectId,
        coin_type_a: String,
        coin_type_b: String,
        plan: DepositPlan,
        slippage_bps: u32,
    },
    RemoveLiquidity {
        pool: ObjectId,
        position: ObjectId,
        coin_type_a: String,
        coin_type_b: String,
        bins: Vec<BinWithdrawal>,
        is_only_a: bool,
        amount: u64,
        slippage_bps: u32,
    },
    CollectFees {
        pool: ObjectId,
        position: ObjectId,
        coin_type_a: String,
        coin_type_b: String,
    },
    CollectRewards {
        pool: ObjectId,
        position: ObjectId,
        coin_type_a: String,
        coin_type_b: String,
        reward_coin_types: Vec<String>,
    },
}

impl TxPayload {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenPosition { .. } => "open_position",
            Self::AddLiquidity { .. } => "add_liquidity",
            Self::RemoveLiquidity { .. } => "remove_liquidity",
            Self::CollectFees { .. } => "collect_fees",
            Self::CollectRewards { .. } => "collect_rewards",
        }
    }
}

/// Object created by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedObject {
    pub object_id: ObjectId,
    pub object_type: String,
}

/// Event emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub parsed_json: serde_json::Value,
}

/// Confirmed transaction effects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TxOutcome {
    pub digest: String,
    pub created: Vec<CreatedObject>,
    pub events: Vec<EmittedEvent>,
}
