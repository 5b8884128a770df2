use crate::{
    accounts::{BinLiquidity, ObjectId, PoolState, PositionInfo},
    client::DlmmSdk,
    error::{StrategyError, StrategyResult},
};

/// Fresh pool snapshot. Fails when the pool has not been initialized.
pub async fn fetch_pool<S: DlmmSdk + ?Sized>(
    sdk: &S,
    pool_id: &ObjectId,
) -> StrategyResult<PoolState> {
    let pool = sdk.get_pool(pool_id).await?;

    if !pool.is_initialized() {
        return Err(StrategyError::PoolNotInitialized(pool_id.to_string()));
    }

    Ok(pool)
}

/// Fresh position snapshot. `PositionNotFound` means the object is gone;
/// read failures surface as collaborator errors.
pub async fn fetch_position<S: DlmmSdk + ?Sized>(
    sdk: &S,
    position_id: &ObjectId,
) -> StrategyResult<PositionInfo> {
    sdk.get_position(position_id)
        .await?
        .ok_or_else(|| StrategyError::PositionNotFound(position_id.to_string()))
}

/// Reserves of the pool's active bin, if it holds any liquidity.
pub async fn fetch_active_bin<S: DlmmSdk + ?Sized>(
    sdk: &S,
    pool: &PoolState,
) -> StrategyResult<Option<BinLiquidity>> {
    Ok(sdk.get_bin_liquidity(pool, pool.active_bin_id).await?)
}
