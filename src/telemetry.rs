//! Shared telemetry bootstrap for tagsift hosts.
//!
//! Library consumers call [`Telemetry::init`] once per process to wire
//! the tracing subscriber and the OpenTelemetry providers the pipeline
//! instruments record into. Exporting is driven by environment: with no
//! OTLP endpoint configured, instruments are registered but nothing
//! leaves the process.

use crate::{Error, Result};

use opentelemetry::global;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ATTR_SERVICE_NAME: &str = "service.name";
const ATTR_SERVICE_NAMESPACE: &str = "service.namespace";
const ATTR_RUN_ID: &str = "tagsift.run_id";

/// Runtime mode for telemetry exporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryMode {
    Disabled,
    Otlp,
}

impl TelemetryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryMode::Disabled => "disabled",
            TelemetryMode::Otlp => "otlp",
        }
    }
}

/// Parsed telemetry configuration from environment.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub mode: TelemetryMode,
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
    pub run_id: Option<String>,
}

impl TelemetryConfig {
    /// Read configuration from the environment.
    ///
    /// - `OTEL_SERVICE_NAME`: service name (defaults to the argument)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: enables OTLP export when set
    /// - `TAGSIFT_TELEMETRY_ENABLED`: explicit on/off override
    /// - `TAGSIFT_TELEMETRY_RUN_ID`: resource attribute for test runs
    pub fn from_env(default_service_name: &str) -> Result<Self> {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| default_service_name.to_string());
        let service_name = service_name.trim().to_string();
        if service_name.is_empty() {
            return Err(Error::Config(
                "OTEL_SERVICE_NAME cannot be empty".to_string(),
            ));
        }

        let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let enabled = parse_optional_bool("TAGSIFT_TELEMETRY_ENABLED")?;
        let mode = match (enabled, endpoint.is_some()) {
            (Some(false), _) => TelemetryMode::Disabled,
            (Some(true), true) | (None, true) => TelemetryMode::Otlp,
            (Some(true), false) => {
                return Err(Error::Config(
                    "TAGSIFT_TELEMETRY_ENABLED=true requires OTEL_EXPORTER_OTLP_ENDPOINT"
                        .to_string(),
                ));
            }
            (None, false) => TelemetryMode::Disabled,
        };

        let run_id = std::env::var("TAGSIFT_TELEMETRY_RUN_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            mode,
            service_name,
            otlp_endpoint: endpoint,
            run_id,
        })
    }

    fn resource(&self) -> Resource {
        let mut attributes = vec![
            KeyValue::new(ATTR_SERVICE_NAME, self.service_name.clone()),
            KeyValue::new(ATTR_SERVICE_NAMESPACE, "tagsift"),
        ];
        if let Some(run_id) = &self.run_id {
            attributes.push(KeyValue::new(ATTR_RUN_ID, run_id.clone()));
        }
        Resource::default().merge(&Resource::new(attributes))
    }
}

/// Handle that keeps telemetry SDK providers alive for process lifetime.
pub struct Telemetry {
    config: TelemetryConfig,
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    /// Initialize shared tracing + OTel SDK providers for a host process.
    pub fn init(default_service_name: &str, log_level: &str) -> Result<Self> {
        let config = TelemetryConfig::from_env(default_service_name)?;
        let level = parse_log_level(log_level)?;
        let rust_log = std::env::var("RUST_LOG").ok();
        let filter = build_log_filter(level, rust_log.as_deref())?;

        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .map_err(|e| {
                Error::Config(format!("failed to initialize telemetry subscriber: {e}"))
            })?;

        let resource = config.resource();

        let tracer_provider = TracerProvider::builder()
            .with_config(
                opentelemetry_sdk::trace::Config::default().with_resource(resource.clone()),
            )
            .build();
        let _ = global::set_tracer_provider(tracer_provider.clone());

        let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
        global::set_meter_provider(meter_provider.clone());
        global::set_text_map_propagator(TraceContextPropagator::new());

        info!(
            service_name = %config.service_name,
            telemetry_mode = config.mode.as_str(),
            otlp_endpoint = %config.otlp_endpoint.as_deref().unwrap_or("none"),
            run_id = %config.run_id.as_deref().unwrap_or("none"),
            "Telemetry bootstrap initialized"
        );

        Ok(Self {
            config,
            tracer_provider,
            meter_provider,
        })
    }

    pub fn mode(&self) -> &TelemetryMode {
        &self.config.mode
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.meter_provider.shutdown();
        let _ = self.tracer_provider.force_flush();
        global::shutdown_tracer_provider();
    }
}

/// Build the subscriber filter: `RUST_LOG` directives when set, the
/// configured level otherwise. Malformed directives are a hard
/// configuration error rather than a silent fallback.
fn build_log_filter(default_level: Level, directives: Option<&str>) -> Result<EnvFilter> {
    let builder =
        EnvFilter::builder().with_default_directive(LevelFilter::from_level(default_level).into());
    match directives {
        Some(raw) => builder
            .parse(raw)
            .map_err(|e| Error::Config(format!("invalid RUST_LOG directives '{raw}': {e}"))),
        None => Ok(builder.parse_lossy("")),
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}

fn parse_optional_bool(name: &str) -> Result<Option<bool>> {
    let Some(raw) = std::env::var(name).ok() else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!(
            "{name} must be a boolean (true/false/1/0), got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_accepts_known_levels() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level(" DEBUG ").unwrap(), Level::DEBUG);
    }

    #[test]
    fn parse_log_level_rejects_unknown_levels() {
        let err = parse_log_level("verbose").unwrap_err();
        assert!(format!("{err}").contains("verbose"));
    }

    #[test]
    fn log_filter_defaults_to_configured_level() {
        let filter = build_log_filter(Level::INFO, None).unwrap();
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn log_filter_honors_rust_log_directives() {
        let filter = build_log_filter(Level::INFO, Some("tagsift=debug")).unwrap();
        assert!(filter.to_string().contains("tagsift=debug"));
    }

    #[test]
    fn log_filter_rejects_malformed_directives() {
        let err = build_log_filter(Level::INFO, Some("tagsift=chatty")).unwrap_err();
        assert!(format!("{err}").contains("RUST_LOG"));
    }
}
