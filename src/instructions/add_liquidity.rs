//! Single-sided, single-bin liquidity placement.

use tracing::{info, instrument};

use crate::{
    accounts::{ObjectId, extract_position_id},
    client::{ChainClient, DlmmSdk},
    config::StrategyConfig,
    error::{StrategyError, StrategyResult},
    instructions::builders::{build_add_liquidity_request, build_open_position_request},
    state::{Asset, PositionState, fetch_active_bin, fetch_pool},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub position_id: ObjectId,
    pub bin_id: i32,
    pub asset: Asset,
    pub amount: u64,
    pub digest: String,
    /// True when a new position was opened, false for a top-up.
    pub opened: bool,
}

/// Deposit the entire wallet balance of `asset` into `target_bin_id`.
///
/// Tops up the open position if there is one, otherwise opens a new position
/// and records its id. An open without a recoverable position id is an error
/// and leaves the state without a position.
///
/// The rebalance cycle always withdraws first, so it only ever opens; the
/// top-up path serves callers that place into a position they keep.
#[instrument(skip_all, fields(pool = %pool_id, bin = target_bin_id, asset = %asset))]
pub async fn place_liquidity<S, C>(
    sdk: &S,
    chain: &C,
    config: &StrategyConfig,
    state: &mut PositionState,
    pool_id: &ObjectId,
    target_bin_id: i32,
    asset: Asset,
) -> StrategyResult<PlacementOutcome>
where
    S: DlmmSdk + ?Sized,
    C: ChainClient + ?Sized,
{
    let amount = chain
        .get_balance(&config.owner, config.coin_type(asset))
        .await?;
    if amount == 0 {
        return Err(StrategyError::InsufficientBalance {
            asset,
            bin_id: target_bin_id,
            available: amount,
        });
    }

    let pool = fetch_pool(sdk, pool_id).await?;
    let active_bin = if target_bin_id == pool.active_bin_id {
        fetch_active_bin(sdk, &pool).await?
    } else {
        None
    };

    let plan = sdk.calculate_deposit(
        amount,
        asset.is_a(),
        pool.active_bin_id,
        pool.bin_step,
        target_bin_id,
        target_bin_id,
        active_bin.as_ref(),
    )?;

    if let Some(position_id) = state.current_position_id.clone() {
        let request = build_add_liquidity_request(config, &pool, &position_id, plan);
        let outcome = chain.execute(&request).await.map_err(|e| {
            StrategyError::TransactionFailed(format!(
                "add_liquidity of {amount} {asset} at bin {target_bin_id}: {e:#}"
            ))
        })?;

        state.current_bin_id = Some(target_bin_id);
        state.touch();
        info!(position = %position_id, amount, digest = %outcome.digest, "Added liquidity to position");

        return Ok(PlacementOutcome {
            position_id,
            bin_id: target_bin_id,
            asset,
            amount,
            digest: outcome.digest,
            opened: false,
        });
    }

    let request = build_open_position_request(config, &pool, target_bin_id, target_bin_id, plan);
    let outcome = chain.execute(&request).await.map_err(|e| {
        StrategyError::TransactionFailed(format!(
            "open_position with {amount} {asset} at bin {target_bin_id}: {e:#}"
        ))
    })?;

    let position_id = extract_position_id(&outcome)?;
    state.open_position(position_id.clone(), target_bin_id);
    info!(position = %position_id, amount, digest = %outcome.digest, "Opened position");

    Ok(PlacementOutcome {
        position_id,
        bin_id: target_bin_id,
        asset,
        amount,
        digest: outcome.digest,
        opened: true,
    })
}
