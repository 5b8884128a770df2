use crate::{
    accounts::{ObjectId, PoolState},
    client::{TransactionRequest, TxPayload},
    config::StrategyConfig,
    math::{DepositPlan, WithdrawPlan},
};

fn request(config: &StrategyConfig, payload: TxPayload) -> TransactionRequest {
    TransactionRequest {
        package_id: config.dlmm_package_id.clone(),
        sender: config.owner.clone(),
        payload,
    }
}

pub fn build_open_position_request(
    config: &StrategyConfig,
    pool: &PoolState,
    lower_bin_id: i32,
    upper_bin_id: i32,
    plan: DepositPlan,
) -> TransactionRequest {
    request(
        config,
        TxPayload::OpenPosition {
            pool: pool.id.clone(),
            coin_type_a: pool.coin_type_a.clone(),
            coin_type_b: pool.coin_type_b.clone(),
            lower_bin_id,
            upper_bin_id,
            plan,
            slippage_bps: config.slippage_bps(),
        },
    )
}

pub fn build_add_liquidity_request(
    config: &StrategyConfig,
    pool: &PoolState,
    position: &ObjectId,
    plan: DepositPlan,
) -> TransactionRequest {
    request(
        config,
        TxPayload::AddLiquidity {
            pool: pool.id.clone(),
            position: position.clone(),
            coin_type_a: pool.coin_type_a.clone(),
            coin_type_b: pool.coin_type_b.clone(),
            plan,
            slippage_bps: config.slippage_bps(),
        },
    )
}

pub fn build_remove_liquidity_request(
    config: &StrategyConfig,
    pool: &PoolState,
    position: &ObjectId,
    plan: WithdrawPlan,
) -> TransactionRequest {
    request(
        config,
        TxPayload::RemoveLiquidity {
            pool: pool.id.clone(),
            position: position.clone(),
            coin_type_a: pool.coin_type_a.clone(),
            coin_type_b: pool.coin_type_b.clone(),
            bins: plan.bins,
            is_only_a: plan.is_only_a,
            amount: plan.amount,
            slippage_bps: config.slippage_bps(),
        },
    )
}

pub fn build_collect_fees_request(
    config: &StrategyConfig,
    pool: &PoolState,
    position: &ObjectId,
) -> TransactionRequest {
    request(
        config,
        TxPayload::CollectFees {
            pool: pool.id.clone(),
            position: position.clone(),
            coin_type_a: pool.coin_type_a.clone(),
            coin_type_b: pool.coin_type_b.clone(),
        },
    )
}

/// `None` when the pool distributes no rewards.
pub fn build_collect_rewards_request(
    config: &StrategyConfig,
    pool: &PoolState,
    position: &ObjectId,
) -> Option<TransactionRequest> {
    if pool.rewards.is_empty() {
        return None;
    }

    Some(request(
        config,
        TxPayload::CollectRewards {
            pool: pool.id.clone(),
            position: position.clone(),
            coin_type_a: pool.coin_type_a.clone(),
            coin_type_b: pool.coin_type_b.clone(),
            reward_coin_types: pool.rewards.iter().map(|r| r.coin_type.clone()).collect(),
        },
    ))
}
