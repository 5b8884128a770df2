//! [`DlmmSdk`] backed by on-chain object reads.
//!
//! Move structs come back from `sui_getObject` as nested `fields` maps.
//! Signed bin ids are stored as `I32 { bits: u32 }` and large integers as
//! decimal strings.

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    accounts::{BinLiquidity, ObjectId, PoolState, PositionInfo, RewardDescriptor},
    client::{DlmmSdk, rpc::JsonRpc},
    constants::CREATE_POOL_EVENT,
};

const EVENT_PAGE_LIMIT: usize = 50;

#[derive(Deserialize)]
struct ObjectResponse {
    data: Option<ObjectData>,
}

#[derive(Deserialize)]
struct ObjectData {
    content: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPage {
    data: Vec<EventEntry>,
    next_cursor: Option<Value>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventEntry {
    parsed_json: Value,
}

pub struct RpcDlmmSdk {
    rpc: JsonRpc,
    package_id: String,
}

impl RpcDlmmSdk {
    pub fn new(http: reqwest::Client, rpc_url: &str, package_id: &str) -> Self {
        Self {
            rpc: JsonRpc::new(http, rpc_url),
            package_id: package_id.to_string(),
        }
    }

    /// `fields` of a Move object, or `None` if the object does not exist.
    async fn object_fields(&self, id: &ObjectId) -> anyhow::Result<Option<Value>> {
        let response: ObjectResponse = self
            .rpc
            .call("sui_getObject", json!([id, { "showContent": true, "showType": true }]))
            .await?;

        Ok(response
            .data
            .and_then(|d| d.content)
            .and_then(|mut c| c.get_mut("fields").map(Value::take)))
    }
}

fn field<'a>(value: &'a Value, path: &[&str]) -> anyhow::Result<&'a Value> {
    let mut current = value;
    for key in path {
        current = current
            .get(key)
            .or_else(move || current.get("fields").and_then(|f| f.get(key)))
            .ok_or_else(|| anyhow!("missing field {}", path.join(".")))?;
    }
    Ok(current)
}

fn as_u128(value: &Value) -> anyhow::Result<u128> {
    match value {
        Value::String(s) => s.parse().with_context(|| format!("invalid integer {s:?}")),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| anyhow!("invalid integer {n}")),
        other => bail!("expected integer, got {other}"),
    }
}

fn as_u64(value: &Value) -> anyhow::Result<u64> {
    Ok(u64::try_from(as_u128(value)?)?)
}

/// Decodes an `I32 { bits }` struct, or a plain signed integer.
fn as_i32(value: &Value) -> anyhow::Result<i32> {
    if let Ok(bits) = field(value, &["bits"]) {
        return Ok(u32::try_from(as_u128(bits)?)? as i32);
    }
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| anyhow!("invalid bin id {n}")),
        Value::String(s) => s.parse().with_context(|| format!("invalid bin id {s:?}")),
        other => bail!("expected bin id, got {other}"),
    }
}

fn as_str(value: &Value) -> anyhow::Result<&str> {
    value
        .as_str()
        .ok_or_else(|| anyhow!("expected string, got {value}"))
}

/// `TypeName` fields hold the type without the `0x` prefix.
fn type_name(value: &Value) -> anyhow::Result<String> {
    let name = match value {
        Value::String(s) => s.as_str(),
        other => as_str(field(other, &["name"])?)?,
    };
    Ok(normalize_type(name))
}

/// Canonical form of a Move type tag: `0x`-prefixed address without
/// leading zeros.
fn normalize_type(coin_type: &str) -> String {
    let (address, rest) = coin_type.split_once("::").unwrap_or((coin_type, ""));
    let trimmed = address.trim_start_matches("0x").trim_start_matches('0');
    let address = if trimmed.is_empty() { "0" } else { trimmed };
    if rest.is_empty() {
        format!("0x{address}")
    } else {
        format!("0x{address}::{rest}")
    }
}

/// Coin types from the generic arguments of `…::pool::Pool<A, B>`.
fn pool_coin_types(object_type: &str) -> Option<(String, String)> {
    let args = object_type.split_once('<')?.1.strip_suffix('>')?;
    let (a, b) = args.split_once(',')?;
    Some((normalize_type(a.trim()), normalize_type(b.trim())))
}

fn parse_pool(id: &ObjectId, object_type: Option<&str>, fields: &Value) -> anyhow::Result<PoolState> {
    let (coin_type_a, coin_type_b) = match object_type.and_then(pool_coin_types) {
        Some(types) => types,
        None => (
            type_name(field(fields, &["coin_type_a"])?)?,
            type_name(field(fields, &["coin_type_b"])?)?,
        ),
    };

    let bin_manager = field(fields, &["bin_manager", "bins", "id", "id"])
        .or_else(|_| field(fields, &["bin_manager", "id", "id"]))?;

    let rewards = match field(fields, &["reward_manager", "rewards"]) {
        Ok(Value::Array(rewards)) => rewards
            .iter()
            .map(|r| {
                Ok(RewardDescriptor {
                    coin_type: type_name(field(r, &["reward_coin"])?)?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?,
        _ => Vec::new(),
    };

    Ok(PoolState {
        id: id.clone(),
        coin_type_a,
        coin_type_b,
        active_bin_id: as_i32(field(fields, &["active_id"])?)?,
        bin_step: u16::try_from(as_u64(field(fields, &["bin_step"])?)?)?,
        bin_manager: ObjectId::new(as_str(bin_manager)?),
        rewards,
    })
}

fn parse_position(id: &ObjectId, fields: &Value) -> anyhow::Result<PositionInfo> {
    let shares = match field(fields, &["liquidity_shares"])? {
        Value::Array(shares) => shares.iter().map(as_u128).collect::<anyhow::Result<Vec<_>>>()?,
        other => bail!("expected share vector, got {other}"),
    };
    let lower_bin_id = as_i32(field(fields, &["lower_bin_id"])?)?;
    let upper_bin_id = match field(fields, &["upper_bin_id"]) {
        Ok(upper) => as_i32(upper)?,
        Err(_) => lower_bin_id + shares.len().saturating_sub(1) as i32,
    };

    Ok(PositionInfo {
        id: id.clone(),
        pool_id: ObjectId::new(as_str(field(fields, &["pool_id"])?)?),
        lower_bin_id,
        upper_bin_id,
        liquidity_shares: shares,
    })
}

fn parse_bin(bin_id: i32, fields: &Value) -> anyhow::Result<BinLiquidity> {
    // Dynamic field wrapper: Field<I32, Bin> { name, value }
    let bin = field(fields, &["value"]).unwrap_or(fields);

    Ok(BinLiquidity {
        bin_id,
        amount_a: as_u64(field(bin, &["amount_a"])?)?,
        amount_b: as_u64(field(bin, &["amount_b"])?)?,
        liquidity_supply: as_u128(field(bin, &["liquidity_supply"])?)?,
    })
}

fn matches_pool(
    event: &Value,
    coin_type_a: &str,
    coin_type_b: &str,
    bin_step: u16,
    base_factor: u32,
) -> anyhow::Result<Option<ObjectId>> {
    let a = type_name(field(event, &["coin_type_a"])?)?;
    let b = type_name(field(event, &["coin_type_b"])?)?;
    let step = as_u64(field(event, &["bin_step"])?)?;
    let factor = match field(event, &["base_factor"]) {
        Ok(value) => as_u64(value)?,
        Err(_) => u64::from(base_factor),
    };

    let same_pair = a == normalize_type(coin_type_a) && b == normalize_type(coin_type_b);
    if same_pair && step == u64::from(bin_step) && factor == u64::from(base_factor) {
        return Ok(Some(ObjectId::new(as_str(field(event, &["pool_id"])?)?)));
    }
    Ok(None)
}

#[async_trait]
impl DlmmSdk for RpcDlmmSdk {
    async fn find_pool_address(
        &self,
        coin_type_a: &str,
        coin_type_b: &str,
        bin_step: u16,
        base_factor: u32,
    ) -> anyhow::Result<Option<ObjectId>> {
        let filter = json!({ "MoveEventType": format!("{}{CREATE_POOL_EVENT}", self.package_id) });
        let mut cursor = Value::Null;

        loop {
            let page: EventPage = self
                .rpc
                .call(
                    "suix_queryEvents",
                    json!([filter, cursor, EVENT_PAGE_LIMIT, false]),
                )
                .await?;

            for event in &page.data {
                match matches_pool(&event.parsed_json, coin_type_a, coin_type_b, bin_step, base_factor) {
                    Ok(Some(pool_id)) => return Ok(Some(pool_id)),
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "Skipping unreadable pool event"),
                }
            }

            match page.next_cursor {
                Some(next) if page.has_next_page && !next.is_null() => cursor = next,
                _ => return Ok(None),
            }
        }
    }

    async fn get_pool(&self, pool_id: &ObjectId) -> anyhow::Result<PoolState> {
        let response: ObjectResponse = self
            .rpc
            .call("sui_getObject", json!([pool_id, { "showContent": true, "showType": true }]))
            .await?;
        let content = response
            .data
            .and_then(|d| d.content)
            .ok_or_else(|| anyhow!("pool {pool_id} not found"))?;

        let object_type = content.get("type").and_then(Value::as_str);
        let fields = field(&content, &["fields"])?;
        parse_pool(pool_id, object_type, fields).with_context(|| format!("decoding pool {pool_id}"))
    }

    async fn get_position(&self, position_id: &ObjectId) -> anyhow::Result<Option<PositionInfo>> {
        let Some(fields) = self.object_fields(position_id).await? else {
            return Ok(None);
        };

        parse_position(position_id, &fields)
            .map(Some)
            .with_context(|| format!("decoding position {position_id}"))
    }

    async fn get_bin_liquidity(
        &self,
        pool: &PoolState,
        bin_id: i32,
    ) -> anyhow::Result<Option<BinLiquidity>> {
        let name = json!({
            "type": format!("{}::i32::I32", self.package_id),
            "value": { "bits": bin_id as u32 },
        });
        let response: ObjectResponse = self
            .rpc
            .call("suix_getDynamicFieldObject", json!([pool.bin_manager, name]))
            .await?;

        let Some(mut content) = response.data.and_then(|d| d.content) else {
            return Ok(None);
        };
        let fields = content
            .get_mut("fields")
            .map(Value::take)
            .ok_or_else(|| anyhow!("bin {bin_id} has no fields"))?;

        let bin = parse_bin(bin_id, &fields)?;
        if bin.liquidity_supply == 0 {
            return Ok(None);
        }
        Ok(Some(bin))
    }
}
