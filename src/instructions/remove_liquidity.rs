//! Single-sided withdrawal of a whole position, with fee collection first.

use tracing::{debug, info, instrument, warn};

use crate::{
    accounts::{ObjectId, PoolState},
    client::{ChainClient, DlmmSdk},
    config::StrategyConfig,
    error::{StrategyError, StrategyResult},
    instructions::builders::{
        build_collect_fees_request, build_collect_rewards_request, build_remove_liquidity_request,
    },
    math::decode_liquidity_shares,
    state::{PositionState, fetch_active_bin, fetch_pool, fetch_position},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalOutcome {
    pub position_id: ObjectId,
    pub is_only_a: bool,
    pub bins: usize,
    /// `None` when nothing was submitted: the position held no shares or no
    /// longer exists.
    pub digest: Option<String>,
    pub fee_collection_failed: bool,
}

/// Collect trading fees and reward accruals for a position.
///
/// Never fails: errors are logged and reported as `false`.
pub async fn collect_fees_best_effort<C: ChainClient + ?Sized>(
    chain: &C,
    config: &StrategyConfig,
    pool: &PoolState,
    position_id: &ObjectId,
) -> bool {
    let mut collected = true;

    let fees = build_collect_fees_request(config, pool, position_id);
    match chain.execute(&fees).await {
        Ok(outcome) => debug!(position = %position_id, digest = %outcome.digest, "Collected fees"),
        Err(e) => {
            warn!(position = %position_id, error = %e, "Fee collection failed, continuing");
            collected = false;
        }
    }

    if let Some(rewards) = build_collect_rewards_request(config, pool, position_id) {
        match chain.execute(&rewards).await {
            Ok(outcome) => {
                debug!(position = %position_id, digest = %outcome.digest, "Collected rewards")
            }
            Err(e) => {
                warn!(position = %position_id, error = %e, "Reward collection failed, continuing");
                collected = false;
            }
        }
    }

    collected
}

/// Remove all liquidity of `position_id`, returning only coin A when
/// `is_only_a` is set and only coin B otherwise.
///
/// On success the position is considered closed, even if dust remains. A
/// position that no longer exists on chain is dropped from the state with a
/// warning so the caller can go on to place liquidity.
#[instrument(skip_all, fields(pool = %pool_id, position = %position_id, is_only_a = is_only_a))]
pub async fn withdraw_liquidity<S, C>(
    sdk: &S,
    chain: &C,
    config: &StrategyConfig,
    state: &mut PositionState,
    pool_id: &ObjectId,
    position_id: &ObjectId,
    is_only_a: bool,
) -> StrategyResult<WithdrawalOutcome>
where
    S: DlmmSdk + ?Sized,
    C: ChainClient + ?Sized,
{
    let position = match fetch_position(sdk, position_id).await {
        Ok(position) => position,
        Err(StrategyError::PositionNotFound(_)) => {
            warn!("Tracked position no longer exists, dropping it");
            state.close_position();
            return Ok(WithdrawalOutcome {
                position_id: position_id.clone(),
                is_only_a,
                bins: 0,
                digest: None,
                fee_collection_failed: false,
            });
        }
        Err(e) => return Err(e),
    };
    let pool = fetch_pool(sdk, pool_id).await?;

    let fee_collection_failed = !collect_fees_best_effort(chain, config, &pool, position_id).await;

    let active_bin = fetch_active_bin(sdk, &pool).await?;
    if let Some(bin) = &active_bin {
        debug!(
            active_bin = bin.bin_id,
            amount_a = bin.amount_a,
            amount_b = bin.amount_b,
            "Active bin reserves"
        );
    }

    let shares = decode_liquidity_shares(
        position.lower_bin_id,
        &position.liquidity_shares,
        pool.active_bin_id,
    );
    let plan = sdk.calculate_withdrawal(
        &shares,
        pool.active_bin_id,
        is_only_a,
        config.position_size,
    );

    if plan.is_empty() {
        info!(
            lower_bin = position.lower_bin_id,
            upper_bin = position.upper_bin_id,
            "Position holds no liquidity, nothing to withdraw"
        );
        state.close_position();
        return Ok(WithdrawalOutcome {
            position_id: position_id.clone(),
            is_only_a,
            bins: 0,
            digest: None,
            fee_collection_failed,
        });
    }

    let bins = plan.bins.len();
    let amount = plan.amount;
    let request = build_remove_liquidity_request(config, &pool, position_id, plan);
    let outcome = chain.execute(&request).await.map_err(|e| {
        StrategyError::TransactionFailed(format!(
            "remove_liquidity of {amount} from {bins} bins (only_a={is_only_a}): {e:#}"
        ))
    })?;

    state.close_position();
    info!(bins, amount, digest = %outcome.digest, "Withdrew liquidity");

    Ok(WithdrawalOutcome {
        position_id: position_id.clone(),
        is_only_a,
        bins,
        digest: Some(outcome.digest),
        fee_collection_failed,
    })
}
