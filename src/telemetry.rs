//! Logging, tracing and metrics setup.
//!
//! Logs always go to stdout through `tracing-subscriber`. When an OTLP
//! endpoint is configured, spans, log records and metrics are also exported
//! over OTLP/HTTP.

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Gauge},
    trace::TracerProvider as _,
};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource, logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracerProvider,
};
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing::warn;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const METER_NAME: &str = "dlmm-range-rebalancer";

pub struct TelemetryConfig<'a> {
    pub service_name: &'a str,
    /// Base OTLP/HTTP endpoint, e.g. `http://localhost:4318`.
    pub otlp_endpoint: Option<&'a str>,
    pub json_logs: bool,
}

/// Keeps exporters alive; call [`TelemetryGuard::shutdown`] before exit.
#[derive(Default)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    logger_provider: Option<SdkLoggerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
        if let Some(provider) = self.meter_provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down meter provider: {e}");
        }
        if let Some(provider) = self.logger_provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down logger provider: {e}");
        }
    }
}

fn resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
        .build()
}

fn otlp_url(endpoint: &str, signal: &str) -> String {
    format!("{}/v1/{signal}", endpoint.trim_end_matches('/'))
}

pub fn init_telemetry(config: TelemetryConfig<'_>) -> anyhow::Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json_logs {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let mut guard = TelemetryGuard::default();

    let (trace_layer, log_layer) = match config.otlp_endpoint {
        Some(endpoint) => {
            let resource = resource(config.service_name);

            let span_exporter = SpanExporter::builder()
                .with_http()
                .with_endpoint(otlp_url(endpoint, "traces"))
                .build()?;
            let tracer_provider = SdkTracerProvider::builder()
                .with_batch_exporter(span_exporter)
                .with_resource(resource.clone())
                .build();
            let tracer = tracer_provider.tracer(config.service_name.to_string());

            let log_exporter = LogExporter::builder()
                .with_http()
                .with_endpoint(otlp_url(endpoint, "logs"))
                .build()?;
            let logger_provider = SdkLoggerProvider::builder()
                .with_batch_exporter(log_exporter)
                .with_resource(resource.clone())
                .build();

            let metric_exporter = MetricExporter::builder()
                .with_http()
                .with_endpoint(otlp_url(endpoint, "metrics"))
                .build()?;
            let meter_provider = SdkMeterProvider::builder()
                .with_periodic_exporter(metric_exporter)
                .with_resource(resource)
                .build();
            global::set_meter_provider(meter_provider.clone());

            let trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            let log_layer = OpenTelemetryTracingBridge::new(&logger_provider);

            guard.tracer_provider = Some(tracer_provider);
            guard.logger_provider = Some(logger_provider);
            guard.meter_provider = Some(meter_provider);

            (Some(trace_layer), Some(log_layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .with(trace_layer)
        .with(log_layer)
        .with(env_filter)
        .try_init()?;

    if config.otlp_endpoint.is_none() {
        warn!("OTLP endpoint not set, exporting logs to stdout only");
    }

    Ok(guard)
}

/// Instruments recorded by the controller.
#[derive(Clone)]
pub struct StrategyMetrics {
    pub rebalances: Counter<u64>,
    pub rebalance_failures: Counter<u64>,
    pub fee_collection_failures: Counter<u64>,
    pub pool_price: Gauge<f64>,
}

impl StrategyMetrics {
    pub fn new() -> Self {
        let meter = global::meter(METER_NAME);

        Self {
            rebalances: meter
                .u64_counter("rebalances")
                .with_description("Completed withdraw-then-place cycles")
                .build(),
            rebalance_failures: meter
                .u64_counter("rebalance_failures")
                .with_description("Poll iterations that ended in an error")
                .build(),
            fee_collection_failures: meter
                .u64_counter("fee_collection_failures")
                .with_description("Withdrawals whose fee or reward collection failed")
                .build(),
            pool_price: meter
                .f64_gauge("pool_price")
                .with_description("Pool price, asset A per asset B")
                .build(),
        }
    }
}

impl Default for StrategyMetrics {
    fn default() -> Self {
        Self::new()
    }
}
