//! Logging, tracing and OpenTelemetry setup for notifier processes
//!
//! Both binaries call [`init_observability`] once at startup and
//! [`shutdown_observability`] before exiting.
//!
//! # Layers
//!
//! 1. **fmt**: structured JSON logs on stdout, always on
//! 2. **EnvFilter**: `RUST_LOG` directives, falling back to the configured level
//! 3. **OpenTelemetry**: span export over OTLP/gRPC, only when an endpoint is set
//!
//! Metrics follow the same rule: without an endpoint the global meter
//! provider stays the no-op default, so `ServerMetrics` and `ClientMetrics`
//! instruments cost nothing.
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint, enables export
//! - `RUST_LOG`: log filter (e.g. `info`, `notifier_client=debug`)
//!
//! ```rust,no_run
//! use notifier_core::ObservabilityConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = ObservabilityConfig::from_env("notification-server");
//! notifier_core::init_observability(config)?;
//!
//! tracing::info!("ready");
//!
//! notifier_core::shutdown_observability();
//! # Ok(())
//! # }
//! ```

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Environment variable naming the OTLP collector
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

// Providers installed by `init_observability`, flushed by `shutdown_observability`.
static PROVIDERS: Mutex<Option<Providers>> = Mutex::new(None);

struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

/// Observability configuration
///
/// # Examples
///
/// ```rust
/// use notifier_core::ObservabilityConfig;
///
/// let config = ObservabilityConfig::new("notification-gateway")
///     .with_endpoint("http://collector:4317")
///     .with_log_level("debug");
///
/// assert!(config.export_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Reported as `service.name` on every span and metric
    pub service_name: String,

    /// Reported as `service.version`
    pub service_version: String,

    /// OTLP/gRPC collector endpoint; `None` keeps telemetry local
    pub otlp_endpoint: Option<String>,

    /// Export spans when an endpoint is configured
    pub enable_traces: bool,

    /// Export metrics when an endpoint is configured
    pub enable_metrics: bool,

    /// Fallback filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "notifier".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: None,
            enable_traces: true,
            enable_metrics: true,
            log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a service name and local-only telemetry
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Create a configuration from the process environment
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Create a configuration from an arbitrary key lookup
    ///
    /// An empty `OTEL_EXPORTER_OTLP_ENDPOINT` is treated as unset.
    pub fn from_lookup<F>(service_name: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(service_name);
        config.otlp_endpoint = lookup(OTLP_ENDPOINT_ENV).filter(|value| !value.trim().is_empty());
        if let Some(level) = lookup("RUST_LOG").filter(|value| !value.trim().is_empty()) {
            config.log_level = level;
        }
        config
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Set the fallback log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the reported service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metric export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// True when telemetry leaves the process
    pub fn export_enabled(&self) -> bool {
        self.otlp_endpoint.is_some()
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global tracing subscriber and, if configured, OTLP exporters
///
/// Call once per process. A second call fails because the global
/// subscriber is already set.
///
/// # Errors
///
/// - the log filter cannot be parsed
/// - an OTLP exporter cannot be built for the configured endpoint
/// - a global subscriber is already installed
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let tracer_provider = match (&config.otlp_endpoint, config.enable_traces) {
        (Some(endpoint), true) => Some(init_tracer_provider(&config, endpoint)?),
        _ => None,
    };

    let meter_provider = match (&config.otlp_endpoint, config.enable_metrics) {
        (Some(endpoint), true) => Some(init_meter_provider(&config, endpoint)?),
        _ => None,
    };

    // Absent when traces are not exported; `Option<Layer>` is a no-op layer.
    let telemetry_layer = tracer_provider.as_ref().map(|provider| {
        use opentelemetry::trace::TracerProvider as _;
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .json();

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    if let Ok(mut slot) = PROVIDERS.lock() {
        *slot = Some(Providers {
            tracer: tracer_provider,
            meter: meter_provider,
        });
    }

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer_provider(
    config: &ObservabilityConfig,
    endpoint: &str,
) -> Result<SdkTracerProvider, BoxError> {
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

fn init_meter_provider(
    config: &ObservabilityConfig,
    endpoint: &str,
) -> Result<SdkMeterProvider, BoxError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

/// Flush and shut down any OTLP providers installed by [`init_observability`]
///
/// Safe to call more than once and safe to call when nothing was installed.
pub fn shutdown_observability() {
    let providers = PROVIDERS.lock().ok().and_then(|mut slot| slot.take());

    let Some(providers) = providers else {
        return;
    };

    if let Some(tracer) = providers.tracer {
        if let Err(e) = tracer.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(meter) = providers.meter {
        if let Err(e) = meter.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }

    tracing::info!("Observability shut down");
}
