//! Discovery of positions owned by the strategy address.

use tracing::{debug, warn};

use crate::{
    accounts::ObjectId,
    client::{ChainClient, DlmmSdk},
    config::StrategyConfig,
};

/// Positions owned by the configured address in `pool_id` that still hold
/// liquidity. Emptied positions left behind by earlier cycles are skipped.
///
/// Lookup failures are logged and reported as no positions.
pub async fn discover_positions<S, C>(
    sdk: &S,
    chain: &C,
    config: &StrategyConfig,
    pool_id: &ObjectId,
) -> Vec<ObjectId>
where
    S: DlmmSdk + ?Sized,
    C: ChainClient + ?Sized,
{
    let owned = match chain
        .get_owned_objects(&config.owner, &config.position_type())
        .await
    {
        Ok(owned) => owned,
        Err(e) => {
            warn!(owner = %config.owner, error = %e, "Position discovery failed");
            return Vec::new();
        }
    };

    let mut positions = Vec::with_capacity(owned.len());
    for position_id in owned {
        match sdk.get_position(&position_id).await {
            Ok(Some(info)) if &info.pool_id != pool_id => {
                debug!(position = %position_id, pool = %info.pool_id, "Skipping position in other pool");
            }
            Ok(Some(info)) if !info.has_liquidity() => {
                debug!(position = %position_id, "Skipping empty position");
            }
            Ok(Some(_)) => positions.push(position_id),
            Ok(None) => {
                debug!(position = %position_id, "Owned position no longer exists");
            }
            Err(e) => {
                warn!(position = %position_id, error = %e, "Could not read owned position");
            }
        }
    }

    positions
}

/// Bin range of a position, or `None` if it cannot be read.
pub async fn resolve_bin_range<S: DlmmSdk + ?Sized>(
    sdk: &S,
    position_id: &ObjectId,
) -> Option<(i32, i32)> {
    match sdk.get_position(position_id).await {
        Ok(Some(info)) => Some((info.lower_bin_id, info.upper_bin_id)),
        Ok(None) => {
            warn!(position = %position_id, "Position does not exist");
            None
        }
        Err(e) => {
            warn!(position = %position_id, error = %e, "Could not resolve bin range");
            None
        }
    }
}
