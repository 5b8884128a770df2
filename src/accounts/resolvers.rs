//! Pool address and position id resolution.
//!
//! Pools are either pinned by configuration or looked up by coin pair. New
//! position ids are recovered from the effects of the opening transaction.

use tracing::{info, warn};

use crate::{
    accounts::ObjectId,
    client::{DlmmSdk, TxOutcome},
    config::StrategyConfig,
    constants::{OPEN_POSITION_EVENT, POSITION_STRUCT},
    error::{StrategyError, StrategyResult},
};

/// Event fields that may carry the new position id.
const POSITION_ID_FIELDS: [&str; 2] = ["position_id", "position"];

/// Resolve the pool to trade in: the configured id if present, otherwise the
/// pool registered for the coin pair, bin step and base factor.
pub async fn resolve_pool_address<S: DlmmSdk + ?Sized>(
    sdk: &S,
    config: &StrategyConfig,
) -> StrategyResult<ObjectId> {
    if let Some(pool_id) = &config.pool_id {
        info!(pool = %pool_id, "Using configured pool");
        return Ok(ObjectId::new(pool_id.clone()));
    }

    let found = sdk
        .find_pool_address(
            &config.coin_type_a,
            &config.coin_type_b,
            config.bin_step,
            config.base_factor,
        )
        .await?;

    match found {
        Some(pool_id) => {
            info!(pool = %pool_id, bin_step = config.bin_step, "Resolved pool by coin pair");
            Ok(pool_id)
        }
        None => Err(StrategyError::PoolNotFound {
            coin_a: config.coin_type_a.clone(),
            coin_b: config.coin_type_b.clone(),
            bin_step: config.bin_step,
        }),
    }
}

/// Recover the id of a freshly opened position.
///
/// Created objects are scanned first for the position struct; the open
/// position event is used as a fallback.
pub fn extract_position_id(outcome: &TxOutcome) -> StrategyResult<ObjectId> {
    if let Some(created) = outcome
        .created
        .iter()
        .find(|object| is_position_type(&object.object_type))
    {
        return Ok(created.object_id.clone());
    }

    let from_event = outcome
        .events
        .iter()
        .filter(|event| event.event_type.ends_with(OPEN_POSITION_EVENT))
        .find_map(|event| {
            POSITION_ID_FIELDS
                .iter()
                .find_map(|field| event.parsed_json.get(field)?.as_str())
        });

    if let Some(id) = from_event {
        warn!(digest = %outcome.digest, position = id, "Position id recovered from event");
        return Ok(ObjectId::new(id));
    }

    Err(StrategyError::PositionIdNotFound {
        digest: outcome.digest.clone(),
    })
}

fn is_position_type(object_type: &str) -> bool {
    // Strip generic parameters: `0x..::position::Position<A, B>`.
    let base = object_type.split('<').next().unwrap_or(object_type);
    base.ends_with(POSITION_STRUCT)
}
