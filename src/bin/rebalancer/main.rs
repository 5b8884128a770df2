mod config;

use config::Config;
use dlmm_range_rebalancer::{
    RebalanceController, StrategyConfig,
    client::{RpcDlmmSdk, SuiRpcClient},
    telemetry::{TelemetryConfig, init_telemetry},
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    let telemetry = init_telemetry(TelemetryConfig {
        service_name: &config.service_name,
        otlp_endpoint: config.otlp_endpoint.as_deref(),
        json_logs: config.json_logs,
    })?;

    let result = run(&config).await;
    if let Err(e) = &result {
        error!(error = ?e, "Rebalancer exited with error");
    }

    telemetry.shutdown();
    result
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let strategy = StrategyConfig::from_env()?;

    info!(
        rpc = %config.rpc_url,
        pool = ?strategy.pool_id,
        lower = strategy.lower_price,
        upper = strategy.upper_price,
        bin_step = strategy.bin_step,
        poll_interval_ms = strategy.poll_interval.as_millis() as u64,
        "Starting rebalancer"
    );

    let http = reqwest::Client::new();
    let sdk = RpcDlmmSdk::new(http.clone(), &config.rpc_url, &strategy.dlmm_package_id);
    let chain = SuiRpcClient::new(http, &config.rpc_url, &config.executor_url);

    let mut controller = RebalanceController::new(strategy, sdk, chain);
    let stop = controller.stop_handle();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            stop.stop();
        }
    });

    controller.start().await?;

    let state = controller.state();
    info!(
        held = %state.current_token,
        position = ?state.current_position_id,
        cumulative_profit = state.cumulative_profit,
        "Final state"
    );

    Ok(())
}
