use std::time::Duration;

/// Denominator for bin steps and basis-point quantities.
pub const BASIS_POINT_MAX: u32 = 10_000;

/// Both stablecoins in the pair use six decimals.
pub const TOKEN_DECIMALS: u8 = 6;

/// Prices are normalized to this many fractional digits.
pub const PRICE_PRECISION: f64 = 1_000_000.0;

/// Price reported when the pool cannot be read. Never treated as a breach.
pub const NEUTRAL_PRICE: f64 = 1.0;

pub const DEFAULT_BASE_FACTOR: u32 = 10_000;
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// Suffix of the Move struct type for DLMM positions (`<package>::position::Position`).
pub const POSITION_STRUCT: &str = "::position::Position";
/// Suffix of the event emitted when a position is opened.
pub const OPEN_POSITION_EVENT: &str = "::pool::OpenPositionEvent";
/// Suffix of the event emitted when a pool is created.
pub const CREATE_POOL_EVENT: &str = "::factory::CreatePoolEvent";

pub fn position_struct_type(package_id: &str) -> String {
    format!("{package_id}{POSITION_STRUCT}")
}
