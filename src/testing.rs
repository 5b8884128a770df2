//! In-memory collaborators for unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;

use crate::{
    accounts::{BinLiquidity, ObjectId, PoolState, PositionInfo},
    client::{ChainClient, CreatedObject, DlmmSdk, EmittedEvent, TransactionRequest, TxOutcome, TxPayload},
    config::StrategyConfig,
    state::{Asset, Balances},
};

type Positions = Arc<Mutex<HashMap<ObjectId, PositionInfo>>>;

pub fn test_config() -> StrategyConfig {
    StrategyConfig {
        upper_price: 1.0005,
        lower_price: 0.9995,
        coin_type_a: "0x2::usdc::USDC".to_string(),
        coin_type_b: "0x3::usdt::USDT".to_string(),
        position_size: 100_000_000,
        bin_step: 1,
        base_factor: 10_000,
        poll_interval: Duration::from_millis(5),
        error_backoff: Duration::from_millis(5),
        slippage: 0.01,
        pool_id: None,
        owner: "0xowner".to_string(),
        dlmm_package_id: "0xdlmm".to_string(),
        default_asset: Asset::B,
    }
}

pub fn sample_pool(active_bin_id: i32) -> PoolState {
    PoolState {
        id: ObjectId::new("0xpool"),
        coin_type_a: "0x2::usdc::USDC".to_string(),
        coin_type_b: "0x3::usdt::USDT".to_string(),
        active_bin_id,
        bin_step: 1,
        bin_manager: ObjectId::new("0xbins"),
        rewards: Vec::new(),
    }
}

pub fn sample_position(id: &str, pool: &str, bin_id: i32) -> PositionInfo {
    PositionInfo {
        id: ObjectId::new(id),
        pool_id: ObjectId::new(pool),
        lower_bin_id: bin_id,
        upper_bin_id: bin_id,
        liquidity_shares: vec![1_000],
    }
}

#[derive(Default)]
struct SdkInner {
    pool: Option<PoolState>,
    fail_pool_reads: bool,
    fail_position_reads: bool,
    pool_reads: usize,
    lookup_result: Option<Option<ObjectId>>,
    pool_lookups: usize,
    bins: HashMap<i32, BinLiquidity>,
}

#[derive(Default)]
pub struct FakeSdk {
    inner: Mutex<SdkInner>,
    positions: Positions,
}

impl FakeSdk {
    pub fn set_pool(&self, pool: PoolState) {
        self.inner.lock().unwrap().pool = Some(pool);
    }

    /// Moves the active bin of the current pool.
    pub fn set_active_bin(&self, bin_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        let pool = inner.pool.get_or_insert_with(|| sample_pool(bin_id));
        pool.active_bin_id = bin_id;
    }

    pub fn fail_pool_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_pool_reads = fail;
    }

    pub fn fail_position_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_position_reads = fail;
    }

    pub fn pool_reads(&self) -> usize {
        self.inner.lock().unwrap().pool_reads
    }

    pub fn set_lookup_result(&self, result: Option<ObjectId>) {
        self.inner.lock().unwrap().lookup_result = Some(result);
    }

    pub fn pool_lookups(&self) -> usize {
        self.inner.lock().unwrap().pool_lookups
    }

    pub fn insert_position(&self, position: PositionInfo) {
        self.positions
            .lock()
            .unwrap()
            .insert(position.id.clone(), position);
    }

    pub fn set_bin(&self, bin: BinLiquidity) {
        self.inner.lock().unwrap().bins.insert(bin.bin_id, bin);
    }
}

#[async_trait]
impl DlmmSdk for FakeSdk {
    async fn find_pool_address(
        &self,
        _coin_type_a: &str,
        _coin_type_b: &str,
        _bin_step: u16,
        _base_factor: u32,
    ) -> anyhow::Result<Option<ObjectId>> {
        let mut inner = self.inner.lock().unwrap();
        inner.pool_lookups += 1;
        Ok(inner
            .lookup_result
            .clone()
            .unwrap_or_else(|| Some(ObjectId::new("0xpool"))))
    }

    async fn get_pool(&self, pool_id: &ObjectId) -> anyhow::Result<PoolState> {
        let mut inner = self.inner.lock().unwrap();
        inner.pool_reads += 1;
        if inner.fail_pool_reads {
            return Err(anyhow!("rpc unavailable"));
        }
        inner
            .pool
            .clone()
            .ok_or_else(|| anyhow!("pool {pool_id} not found"))
    }

    async fn get_position(&self, position_id: &ObjectId) -> anyhow::Result<Option<PositionInfo>> {
        if self.inner.lock().unwrap().fail_position_reads {
            return Err(anyhow!("rpc unavailable"));
        }
        Ok(self.positions.lock().unwrap().get(position_id).cloned())
    }

    async fn get_bin_liquidity(
        &self,
        _pool: &PoolState,
        bin_id: i32,
    ) -> anyhow::Result<Option<BinLiquidity>> {
        Ok(self.inner.lock().unwrap().bins.get(&bin_id).cloned())
    }
}

#[derive(Default)]
struct ChainInner {
    balances: Balances,
    fail_balances: bool,
    owned: Vec<ObjectId>,
    fail_owned_objects: bool,
    omit_position_id: bool,
    failing_actions: Vec<&'static str>,
    withdraw_credit: u64,
    execute_delay: Duration,
    requests: Vec<TransactionRequest>,
    opened: usize,
}

/// Chain that applies deposits and withdrawals to in-memory balances.
#[derive(Default)]
pub struct FakeChain {
    inner: Mutex<ChainInner>,
    positions: Positions,
}

impl FakeChain {
    pub fn with_balances(a: u64, b: u64) -> Self {
        let chain = Self::default();
        chain.inner.lock().unwrap().balances = Balances { a, b };
        chain
    }

    /// Chain whose opened positions become readable through `sdk`.
    pub fn linked(sdk: &FakeSdk, a: u64, b: u64) -> Self {
        let chain = Self::with_balances(a, b);
        Self {
            inner: chain.inner,
            positions: sdk.positions.clone(),
        }
    }

    pub fn balances(&self) -> Balances {
        self.inner.lock().unwrap().balances
    }

    pub fn fail_balances(&self, fail: bool) {
        self.inner.lock().unwrap().fail_balances = fail;
    }

    pub fn set_owned(&self, owned: Vec<ObjectId>) {
        self.inner.lock().unwrap().owned = owned;
    }

    pub fn fail_owned_objects(&self, fail: bool) {
        self.inner.lock().unwrap().fail_owned_objects = fail;
    }

    pub fn omit_position_id(&self, omit: bool) {
        self.inner.lock().unwrap().omit_position_id = omit;
    }

    pub fn fail_action(&self, action: &'static str) {
        self.inner.lock().unwrap().failing_actions.push(action);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failing_actions.clear();
    }

    /// Amount paid out by the next withdrawals, on the requested side.
    pub fn set_withdraw_credit(&self, amount: u64) {
        self.inner.lock().unwrap().withdraw_credit = amount;
    }

    /// Every `execute` call sleeps this long before taking effect.
    pub fn set_execute_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().execute_delay = delay;
    }

    pub fn requests(&self) -> Vec<TransactionRequest> {
        self.inner.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_balance(&self, _owner: &str, coin_type: &str) -> anyhow::Result<u64> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_balances {
            return Err(anyhow!("balance query failed"));
        }
        if coin_type.ends_with("::USDC") {
            Ok(inner.balances.a)
        } else {
            Ok(inner.balances.b)
        }
    }

    async fn get_owned_objects(
        &self,
        _owner: &str,
        _struct_type: &str,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_owned_objects {
            return Err(anyhow!("owned object query failed"));
        }
        Ok(inner.owned.clone())
    }

    async fn execute(&self, request: &TransactionRequest) -> anyhow::Result<TxOutcome> {
        let delay = self.inner.lock().unwrap().execute_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        let action = request.payload.name();
        if inner.failing_actions.contains(&action) {
            return Err(anyhow!("{action} aborted"));
        }
        inner.requests.push(request.clone());
        let digest = format!("digest-{}", inner.requests.len());

        match &request.payload {
            TxPayload::OpenPosition {
                pool,
                lower_bin_id,
                upper_bin_id,
                plan,
                ..
            } => {
                inner.balances.a -= plan.total_a;
                inner.balances.b -= plan.total_b;
                inner.opened += 1;
                let id = ObjectId::new(format!("0xpos-{}", inner.opened));
                self.positions.lock().unwrap().insert(
                    id.clone(),
                    PositionInfo {
                        id: id.clone(),
                        pool_id: pool.clone(),
                        lower_bin_id: *lower_bin_id,
                        upper_bin_id: *upper_bin_id,
                        liquidity_shares: plan.bins.iter().map(|b| b.liquidity_share).collect(),
                    },
                );

                if inner.omit_position_id {
                    return Ok(TxOutcome {
                        digest,
                        created: Vec::new(),
                        events: vec![EmittedEvent {
                            event_type: "0xdlmm::pool::OpenPositionEvent".to_string(),
                            parsed_json: json!({ "pool": pool }),
                        }],
                    });
                }

                Ok(TxOutcome {
                    digest,
                    created: vec![CreatedObject {
                        object_id: id,
                        object_type: "0xdlmm::position::Position".to_string(),
                    }],
                    events: Vec::new(),
                })
            }
            TxPayload::AddLiquidity { plan, .. } => {
                inner.balances.a -= plan.total_a;
                inner.balances.b -= plan.total_b;
                Ok(TxOutcome {
                    digest,
                    ..TxOutcome::default()
                })
            }
            TxPayload::RemoveLiquidity { is_only_a, .. } => {
                let credit = inner.withdraw_credit;
                if *is_only_a {
                    inner.balances.a += credit;
                } else {
                    inner.balances.b += credit;
                }
                Ok(TxOutcome {
                    digest,
                    ..TxOutcome::default()
                })
            }
            TxPayload::CollectFees { .. } | TxPayload::CollectRewards { .. } => Ok(TxOutcome {
                digest,
                ..TxOutcome::default()
            }),
        }
    }
}
