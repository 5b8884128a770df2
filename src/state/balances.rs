use tracing::{info, warn};

use crate::{
    client::ChainClient,
    config::StrategyConfig,
    state::{Asset, Balances},
};

/// Wallet balances of both coins for the configured owner.
pub async fn fetch_balances<C: ChainClient + ?Sized>(
    chain: &C,
    config: &StrategyConfig,
) -> anyhow::Result<Balances> {
    let (a, b) = tokio::try_join!(
        chain.get_balance(&config.owner, &config.coin_type_a),
        chain.get_balance(&config.owner, &config.coin_type_b),
    )?;

    Ok(Balances { a, b })
}

/// Decide which asset is held at startup.
///
/// The strictly larger balance wins and a tie falls back to `default`. When
/// balances could not be read, `current` is kept if a position already exists,
/// otherwise `default` is used.
pub fn resolve_initial_asset(
    balances: Option<&Balances>,
    has_position: bool,
    current: Asset,
    default: Asset,
) -> Asset {
    match balances {
        Some(balances) if balances.a > balances.b => Asset::A,
        Some(balances) if balances.b > balances.a => Asset::B,
        Some(balances) => {
            info!(a = balances.a, b = balances.b, %default, "Balances tie, using default asset");
            default
        }
        None if has_position => {
            warn!(%current, "Balances unavailable, keeping state of existing position");
            current
        }
        None => {
            warn!(%default, "Balances unavailable, using default asset");
            default
        }
    }
}
