use std::env;

/// Process settings that sit outside the strategy parameters.
pub struct Config {
    pub rpc_url: String,
    pub executor_url: String,
    pub otlp_endpoint: Option<String>,
    pub json_logs: bool,
    pub service_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let rpc_url = env::var("RPC_URL")
            .unwrap_or_else(|_| "https://fullnode.mainnet.sui.io:443".to_string());

        let executor_url =
            env::var("EXECUTOR_URL").unwrap_or_else(|_| "http://127.0.0.1:9100/execute".to_string());

        let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty());

        let json_logs = env::var("LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "dlmm-range-rebalancer".to_string());

        Ok(Self {
            rpc_url,
            executor_url,
            otlp_endpoint,
            json_logs,
            service_name,
        })
    }
}
