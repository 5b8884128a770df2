//! Rebalance controller: the two-state holding machine and its polling loop.
//!
//! The controller holds either asset A or asset B. Holding A, it waits for the
//! price to reach the upper bound; holding B, it waits for the lower bound.
//! On a breach it withdraws the open position on the held side, places the
//! full wallet balance of the held asset single-sided at the bin of the
//! breached bound, and flips to the other asset.

use std::sync::Arc;

use tokio::{sync::watch, time::sleep};
use tracing::{error, info, warn};

use crate::{
    accounts::{ObjectId, resolve_pool_address},
    client::{ChainClient, DlmmSdk},
    config::StrategyConfig,
    error::{StrategyError, StrategyResult},
    instructions::{place_liquidity, withdraw_liquidity},
    state::{
        Asset, Balances, PendingPlacement, PositionState, PriceReading, discover_positions,
        fetch_balances, read_price, resolve_bin_range, resolve_initial_asset, target_bin_for_price,
    },
    telemetry::StrategyMetrics,
};

/// A guarded state change, decided from a single price reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: Asset,
    pub to: Asset,
    /// Side requested from the open position.
    pub withdraw_only_a: bool,
    /// Asset whose full balance is placed.
    pub deposit: Asset,
    /// Bound that was breached; its bin receives the deposit.
    pub boundary_price: f64,
}

/// Decide whether `held` must be rebalanced at this reading.
///
/// Breaches are inclusive: holding A triggers at `price >= upper`, holding B
/// at `price <= lower`. A fallback reading never triggers.
pub fn evaluate_transition(
    held: Asset,
    reading: &PriceReading,
    lower_price: f64,
    upper_price: f64,
) -> Option<Transition> {
    if reading.is_fallback {
        return None;
    }

    match held {
        Asset::A if reading.price >= upper_price => Some(Transition {
            from: Asset::A,
            to: Asset::B,
            withdraw_only_a: true,
            deposit: Asset::A,
            boundary_price: upper_price,
        }),
        Asset::B if reading.price <= lower_price => Some(Transition {
            from: Asset::B,
            to: Asset::A,
            withdraw_only_a: false,
            deposit: Asset::B,
            boundary_price: lower_price,
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Idle(PriceReading),
    Rebalanced(Transition),
    /// A placement left over from a failed iteration was completed.
    Resumed(PendingPlacement),
}

/// Signals a running controller to exit after its current iteration.
#[derive(Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

pub struct RebalanceController<S, C> {
    sdk: S,
    chain: C,
    config: StrategyConfig,
    state: PositionState,
    stop_tx: Arc<watch::Sender<bool>>,
    metrics: StrategyMetrics,
}

impl<S, C> RebalanceController<S, C>
where
    S: DlmmSdk,
    C: ChainClient,
{
    pub fn new(config: StrategyConfig, sdk: S, chain: C) -> Self {
        let (stop_tx, _) = watch::channel(false);

        Self {
            sdk,
            chain,
            state: PositionState::new(config.default_asset),
            config,
            stop_tx: Arc::new(stop_tx),
            metrics: StrategyMetrics::new(),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_tx.clone())
    }

    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Resolve the pool and startup state, then poll until stopped.
    ///
    /// Only a failure to resolve the pool is returned; errors inside the loop
    /// are logged and retried.
    pub async fn start(&mut self) -> StrategyResult<()> {
        let pool_id = self.initialize().await?;
        self.run(&pool_id).await;
        info!("Rebalance controller stopped");
        Ok(())
    }

    /// Resolve the pool, adopt an existing position and pick the held asset.
    pub async fn initialize(&mut self) -> StrategyResult<ObjectId> {
        let pool_id = resolve_pool_address(&self.sdk, &self.config).await?;

        let positions = discover_positions(&self.sdk, &self.chain, &self.config, &pool_id).await;
        if positions.len() > 1 {
            warn!(
                count = positions.len(),
                adopted = %positions[0],
                "Multiple positions found, only the first is managed"
            );
        }
        if let Some(position_id) = positions.into_iter().next() {
            let bin_id = resolve_bin_range(&self.sdk, &position_id)
                .await
                .map(|(lower, _)| lower);
            info!(position = %position_id, bin = ?bin_id, "Adopted existing position");
            self.state.current_position_id = Some(position_id);
            self.state.current_bin_id = bin_id;
        }

        let balances = match fetch_balances(&self.chain, &self.config).await {
            Ok(balances) => Some(balances),
            Err(e) => {
                warn!(error = %e, "Could not read balances at startup");
                None
            }
        };
        self.state.balances = balances;
        self.state.current_token = resolve_initial_asset(
            balances.as_ref(),
            self.state.has_position(),
            self.state.current_token,
            self.config.default_asset,
        );

        info!(
            pool = %pool_id,
            held = %self.state.current_token,
            lower = self.config.lower_price,
            upper = self.config.upper_price,
            "Rebalance controller initialized"
        );

        Ok(pool_id)
    }

    async fn run(&mut self, pool_id: &ObjectId) {
        let mut stop_rx = self.stop_tx.subscribe();

        while !*stop_rx.borrow() {
            let delay = match self.poll_once(pool_id).await {
                Ok(_) => self.config.poll_interval,
                Err(e) => {
                    error!(
                        error = %e,
                        held = %self.state.current_token,
                        position = ?self.state.current_position_id,
                        "Poll iteration failed, backing off"
                    );
                    self.metrics.rebalance_failures.add(1, &[]);
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = sleep(delay) => {}
                _ = stop_rx.changed() => {}
            }
        }
    }

    /// One polling iteration. Completes any pending placement first,
    /// otherwise reads the price and rebalances on a breach.
    pub async fn poll_once(&mut self, pool_id: &ObjectId) -> StrategyResult<PollOutcome> {
        if let Some(pending) = self.state.pending {
            info!(asset = %pending.deposit, bin = pending.bin_id, "Resuming pending placement");
            self.complete_placement(pool_id).await?;
            return Ok(PollOutcome::Resumed(pending));
        }

        let reading = read_price(&self.sdk, pool_id).await;
        if !reading.is_fallback {
            self.metrics.pool_price.record(reading.price, &[]);
        }

        let Some(transition) = evaluate_transition(
            self.state.current_token,
            &reading,
            self.config.lower_price,
            self.config.upper_price,
        ) else {
            return Ok(PollOutcome::Idle(reading));
        };

        info!(
            price = reading.price,
            from = %transition.from,
            to = %transition.to,
            boundary = transition.boundary_price,
            "Price breached bound, rebalancing"
        );
        self.rebalance(pool_id, &transition).await?;
        self.metrics.rebalances.add(1, &[]);

        Ok(PollOutcome::Rebalanced(transition))
    }

    async fn rebalance(&mut self, pool_id: &ObjectId, transition: &Transition) -> StrategyResult<()> {
        let target_bin = target_bin_for_price(&self.sdk, transition.boundary_price, self.config.bin_step)?;

        if let Some(position_id) = self.state.current_position_id.clone() {
            let outcome = withdraw_liquidity(
                &self.sdk,
                &self.chain,
                &self.config,
                &mut self.state,
                pool_id,
                &position_id,
                transition.withdraw_only_a,
            )
            .await?;
            if outcome.fee_collection_failed {
                self.metrics.fee_collection_failures.add(1, &[]);
            }
        }

        if let Some(balances) = self.refresh_balances().await {
            self.record_profit(&balances);
        }

        self.state.pending = Some(PendingPlacement {
            deposit: transition.deposit,
            bin_id: target_bin,
        });
        self.complete_placement(pool_id).await
    }

    async fn complete_placement(&mut self, pool_id: &ObjectId) -> StrategyResult<()> {
        let Some(pending) = self.state.pending else {
            return Ok(());
        };

        let result = place_liquidity(
            &self.sdk,
            &self.chain,
            &self.config,
            &mut self.state,
            pool_id,
            pending.bin_id,
            pending.deposit,
        )
        .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e @ StrategyError::InsufficientBalance { .. }) => {
                // Nothing left to place; the guard is re-evaluated next poll.
                self.state.pending = None;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.state.pending = None;
        self.state.current_token = pending.deposit.other();
        self.refresh_balances().await;

        info!(
            position = %outcome.position_id,
            bin = outcome.bin_id,
            amount = outcome.amount,
            held = %self.state.current_token,
            cumulative_profit = self.state.cumulative_profit,
            "Rebalance complete"
        );

        Ok(())
    }

    async fn refresh_balances(&mut self) -> Option<Balances> {
        match fetch_balances(&self.chain, &self.config).await {
            Ok(balances) => {
                self.state.balances = Some(balances);
                Some(balances)
            }
            Err(e) => {
                warn!(error = %e, "Balance refresh failed");
                None
            }
        }
    }

    /// Profit is the change in combined wallet value between consecutive
    /// points where all capital is in the wallet.
    fn record_profit(&mut self, balances: &Balances) {
        let value = balances.combined();
        if let Some(previous) = self.state.value_before_placement.replace(value) {
            let delta = value as i128 - previous as i128;
            self.state.cumulative_profit += delta;
            info!(delta, cumulative = self.state.cumulative_profit, "Updated profit counter");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        client::TxPayload,
        constants::NEUTRAL_PRICE,
        testing::{FakeChain, FakeSdk, sample_pool, sample_position, test_config},
    };

    const LOWER: f64 = 0.9995;
    const UPPER: f64 = 1.0005;

    fn reading(price: f64) -> PriceReading {
        PriceReading {
            price,
            active_bin_id: None,
            is_fallback: false,
        }
    }

    #[test]
    fn holding_b_inside_band_is_a_no_op() {
        for price in [0.99951, 1.0, 1.0005, 1.2] {
            assert_eq!(evaluate_transition(Asset::B, &reading(price), LOWER, UPPER), None);
        }
    }

    #[test]
    fn holding_a_below_upper_is_a_no_op() {
        for price in [0.5, 0.9995, 1.0, 1.00049] {
            assert_eq!(evaluate_transition(Asset::A, &reading(price), LOWER, UPPER), None);
        }
    }

    #[test]
    fn bounds_are_inclusive_on_breach() {
        let down = evaluate_transition(Asset::B, &reading(LOWER), LOWER, UPPER).unwrap();
        assert_eq!(down.to, Asset::A);
        assert_eq!(down.deposit, Asset::B);
        assert_eq!(down.boundary_price, LOWER);

        let up = evaluate_transition(Asset::A, &reading(UPPER), LOWER, UPPER).unwrap();
        assert_eq!(up.to, Asset::B);
        assert_eq!(up.deposit, Asset::A);
        assert_eq!(up.boundary_price, UPPER);
    }

    #[test]
    fn withdrawal_side_follows_held_asset() {
        let from_a = evaluate_transition(Asset::A, &reading(2.0), LOWER, UPPER).unwrap();
        assert!(from_a.withdraw_only_a);

        let from_b = evaluate_transition(Asset::B, &reading(0.5), LOWER, UPPER).unwrap();
        assert!(!from_b.withdraw_only_a);
    }

    #[test]
    fn fallback_reading_never_triggers() {
        let fallback = PriceReading::neutral();
        // Even with a band that excludes the neutral price.
        assert_eq!(evaluate_transition(Asset::A, &fallback, 0.5, 0.9), None);
        assert_eq!(evaluate_transition(Asset::B, &fallback, 1.1, 1.2), None);
    }

    #[test]
    fn alternates_one_step_per_breach() {
        let mut held = Asset::B;
        let mut transitions = 0;

        for price in [LOWER, 0.9, UPPER, 1.1, LOWER] {
            if let Some(t) = evaluate_transition(held, &reading(price), LOWER, UPPER) {
                assert_eq!(t.from, held);
                held = t.to;
                transitions += 1;
            }
        }

        // lower: B -> A, 0.9: no-op, upper: A -> B, 1.1: no-op, lower: B -> A
        assert_eq!(transitions, 3);
        assert_eq!(held, Asset::A);
    }

    #[tokio::test]
    async fn usdt_holder_places_all_usdt_at_lower_bound() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6)); // price 0.9994
        let chain = FakeChain::linked(&sdk, 0, 100_000_000);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);

        let pool = controller.initialize().await.unwrap();
        assert_eq!(controller.state().current_token, Asset::B);

        let outcome = controller.poll_once(&pool).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Rebalanced(_)));

        let requests = controller.chain.requests();
        assert_eq!(requests.len(), 1);
        match &requests[0].payload {
            TxPayload::OpenPosition {
                lower_bin_id, plan, ..
            } => {
                assert_eq!(*lower_bin_id, -6);
                assert_eq!(plan.total_b, 100_000_000);
                assert_eq!(plan.total_a, 0);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let state = controller.state();
        assert_eq!(state.current_token, Asset::A);
        assert!(state.current_position_id.is_some());
        assert_eq!(state.current_bin_id, Some(-6));
    }

    #[tokio::test]
    async fn full_cycle_withdraws_then_places_and_tracks_profit() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6));
        let chain = FakeChain::linked(&sdk, 0, 100_000_000);
        chain.set_withdraw_credit(100_050_000);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);
        let pool = controller.initialize().await.unwrap();

        controller.poll_once(&pool).await.unwrap();
        assert_eq!(controller.state().current_token, Asset::A);

        // Inside the band: nothing happens.
        controller.sdk.set_active_bin(0);
        assert!(matches!(
            controller.poll_once(&pool).await.unwrap(),
            PollOutcome::Idle(_)
        ));

        // Price 1.0005: withdraw USDC, place it at the upper bound.
        controller.sdk.set_active_bin(5);
        let outcome = controller.poll_once(&pool).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Rebalanced(t) if t.to == Asset::B));

        let requests = controller.chain.requests();
        let names: Vec<&str> = requests.iter().map(|r| r.payload.name()).collect();
        assert_eq!(
            names,
            vec!["open_position", "collect_fees", "remove_liquidity", "open_position"]
        );
        match &requests[2].payload {
            TxPayload::RemoveLiquidity { is_only_a, .. } => assert!(*is_only_a),
            other => panic!("unexpected payload {other:?}"),
        }
        match &requests[3].payload {
            TxPayload::OpenPosition {
                lower_bin_id, plan, ..
            } => {
                assert_eq!(*lower_bin_id, 4);
                assert_eq!(plan.total_a, 100_050_000);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let state = controller.state();
        assert_eq!(state.current_token, Asset::B);
        assert_eq!(state.cumulative_profit, 50_000);
    }

    #[tokio::test]
    async fn oracle_failure_takes_no_action() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(0));
        let chain = FakeChain::linked(&sdk, 100, 0);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);
        let pool = controller.initialize().await.unwrap();
        assert_eq!(controller.state().current_token, Asset::A);

        controller.sdk.fail_pool_reads(true);
        let outcome = controller.poll_once(&pool).await.unwrap();

        match outcome {
            PollOutcome::Idle(reading) => {
                assert!(reading.is_fallback);
                assert_eq!(reading.price, NEUTRAL_PRICE);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(controller.chain.requests().is_empty());
        assert_eq!(controller.state().current_token, Asset::A);
    }

    #[tokio::test]
    async fn failed_placement_is_resumed_next_poll() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(5));
        sdk.insert_position(sample_position("0xold", "0xpool", -6));
        let chain = FakeChain::linked(&sdk, 0, 0);
        chain.set_owned(vec![ObjectId::new("0xold")]);
        chain.set_withdraw_credit(100_000_000);
        let mut config = test_config();
        config.default_asset = Asset::A;
        let mut controller = RebalanceController::new(config, sdk, chain);
        let pool = controller.initialize().await.unwrap();
        assert_eq!(controller.state().current_position_id, Some(ObjectId::new("0xold")));

        controller.chain.fail_action("open_position");
        let err = controller.poll_once(&pool).await.unwrap_err();
        assert!(matches!(err, StrategyError::TransactionFailed(_)));

        let state = controller.state();
        assert!(state.current_position_id.is_none());
        assert_eq!(state.current_token, Asset::A);
        assert_eq!(
            state.pending,
            Some(PendingPlacement {
                deposit: Asset::A,
                bin_id: 4
            })
        );

        controller.chain.clear_failures();
        let outcome = controller.poll_once(&pool).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Resumed(_)));

        let state = controller.state();
        assert!(state.pending.is_none());
        assert_eq!(state.current_token, Asset::B);
        assert!(state.current_position_id.is_some());

        // The withdrawal ran exactly once.
        let removals = controller
            .chain
            .requests()
            .iter()
            .filter(|r| r.payload.name() == "remove_liquidity")
            .count();
        assert_eq!(removals, 1);
    }

    #[tokio::test]
    async fn missing_position_id_fails_iteration_without_placeholder() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6));
        let chain = FakeChain::linked(&sdk, 0, 100);
        chain.omit_position_id(true);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);
        let pool = controller.initialize().await.unwrap();

        let err = controller.poll_once(&pool).await.unwrap_err();

        assert!(matches!(err, StrategyError::PositionIdNotFound { .. }));
        assert!(controller.state().current_position_id.is_none());
        assert_eq!(controller.state().current_token, Asset::B);
    }

    #[tokio::test]
    async fn initialize_adopts_first_of_several_positions() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(0));
        sdk.insert_position(sample_position("0xfirst", "0xpool", 3));
        sdk.insert_position(sample_position("0xsecond", "0xpool", 7));
        let chain = FakeChain::linked(&sdk, 0, 0);
        chain.set_owned(vec![ObjectId::new("0xfirst"), ObjectId::new("0xsecond")]);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);

        controller.initialize().await.unwrap();

        let state = controller.state();
        assert_eq!(state.current_position_id, Some(ObjectId::new("0xfirst")));
        assert_eq!(state.current_bin_id, Some(3));
    }

    #[tokio::test]
    async fn unreadable_balances_fall_back_to_default() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(0));
        let chain = FakeChain::linked(&sdk, 100, 0);
        chain.fail_balances(true);
        let mut config = test_config();
        config.default_asset = Asset::B;
        let mut controller = RebalanceController::new(config, sdk, chain);

        controller.initialize().await.unwrap();

        assert_eq!(controller.state().current_token, Asset::B);
        assert!(controller.state().balances.is_none());
    }

    #[tokio::test]
    async fn pool_resolution_failure_is_fatal() {
        let sdk = FakeSdk::default();
        sdk.set_lookup_result(None);
        let chain = FakeChain::with_balances(0, 0);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, StrategyError::PoolNotFound { .. }));
    }

    #[tokio::test]
    async fn stop_before_start_exits_without_polling() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6));
        let chain = FakeChain::linked(&sdk, 0, 100);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);

        controller.stop();
        controller.start().await.unwrap();

        assert!(controller.chain.requests().is_empty());
    }

    #[tokio::test]
    async fn stop_handle_ends_running_loop() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(0));
        let chain = FakeChain::linked(&sdk, 0, 100);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);
        let handle = controller.stop_handle();

        let task = tokio::spawn(async move {
            controller.start().await.unwrap();
            controller
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop();

        let controller = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("controller did not stop")
            .unwrap();
        assert!(controller.chain.requests().is_empty());
    }

    #[tokio::test]
    async fn loop_keeps_polling_after_errors() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6));
        let chain = FakeChain::linked(&sdk, 0, 100);
        chain.fail_action("open_position");
        let mut controller = RebalanceController::new(test_config(), sdk, chain);
        let handle = controller.stop_handle();

        let task = tokio::spawn(async move {
            controller.start().await.unwrap();
            controller
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop();
        let controller = task.await.unwrap();

        // The placement kept failing but the loop survived and is still pending.
        assert!(controller.state().pending.is_some());
        assert_eq!(controller.state().current_token, Asset::B);
    }

    #[tokio::test]
    async fn adopts_funded_position_over_emptied_one() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6));
        let mut stale = sample_position("0xstale", "0xpool", -6);
        stale.liquidity_shares = vec![0];
        sdk.insert_position(stale);
        sdk.insert_position(sample_position("0xlive", "0xpool", -6));
        let chain = FakeChain::linked(&sdk, 0, 0);
        chain.set_owned(vec![ObjectId::new("0xstale"), ObjectId::new("0xlive")]);
        chain.set_withdraw_credit(100_000_000);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);

        let pool = controller.initialize().await.unwrap();
        assert_eq!(controller.state().current_position_id, Some(ObjectId::new("0xlive")));

        controller.poll_once(&pool).await.unwrap();

        let requests = controller.chain.requests();
        let names: Vec<&str> = requests.iter().map(|r| r.payload.name()).collect();
        assert_eq!(names, vec!["collect_fees", "remove_liquidity", "open_position"]);
        match &requests[1].payload {
            TxPayload::RemoveLiquidity { position, .. } => {
                assert_eq!(position, &ObjectId::new("0xlive"))
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(controller.state().current_token, Asset::A);
    }

    #[tokio::test]
    async fn vanished_position_does_not_block_placement() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6));
        let chain = FakeChain::linked(&sdk, 0, 100_000_000);
        let mut controller = RebalanceController::new(test_config(), sdk, chain);
        let pool = controller.initialize().await.unwrap();
        controller.state.open_position(ObjectId::new("0xgone"), -6);

        let outcome = controller.poll_once(&pool).await.unwrap();

        assert!(matches!(outcome, PollOutcome::Rebalanced(_)));
        let names: Vec<&str> = controller
            .chain
            .requests()
            .iter()
            .map(|r| r.payload.name())
            .collect();
        assert_eq!(names, vec!["open_position"]);

        let state = controller.state();
        assert_eq!(state.current_token, Asset::A);
        assert_ne!(state.current_position_id, Some(ObjectId::new("0xgone")));
        assert!(state.current_position_id.is_some());
    }

    #[tokio::test]
    async fn stop_lets_in_flight_rebalance_finish() {
        let sdk = FakeSdk::default();
        sdk.set_pool(sample_pool(-6));
        let chain = FakeChain::linked(&sdk, 0, 100_000_000);
        chain.set_execute_delay(Duration::from_millis(100));
        let mut controller = RebalanceController::new(test_config(), sdk, chain);
        let handle = controller.stop_handle();

        let task = tokio::spawn(async move {
            controller.start().await.unwrap();
            controller
        });

        // The open is now sleeping inside execute.
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop();

        let controller = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("controller did not stop")
            .unwrap();

        let state = controller.state();
        assert!(state.pending.is_none());
        assert_eq!(state.current_token, Asset::A);
        assert!(state.current_position_id.is_some());
        assert_eq!(controller.chain.requests().len(), 1);
        // One price read plus the placement's pool read: no second iteration.
        assert_eq!(controller.sdk.pool_reads(), 2);
    }
}
