//! Shared telemetry bootstrap for Chunkvault embedders.
//!
//! Components publish their counters and histograms through the global
//! OpenTelemetry meter; where those measurements go is decided here, once
//! per process. The library itself never installs an exporter — the
//! embedder keeps the returned handle alive and wires its own.

use crate::{Error, Result};

use opentelemetry::global;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const ATTR_SERVICE_NAME: &str = "service.name";
const ATTR_SERVICE_NAMESPACE: &str = "service.namespace";

/// Handle that keeps the telemetry providers alive for process lifetime.
pub struct Telemetry {
    service_name: String,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    /// Initialize structured logging and the global meter provider.
    ///
    /// The service name can be overridden with `OTEL_SERVICE_NAME`.
    pub fn init(default_service_name: &str, log_level: &str) -> Result<Self> {
        let service_name = std::env::var("OTEL_SERVICE_NAME")
            .unwrap_or_else(|_| default_service_name.to_string());
        let service_name = service_name.trim().to_string();
        if service_name.is_empty() {
            return Err(Error::Config("service name cannot be empty".to_string()));
        }

        let level = parse_log_level(log_level)?;
        FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .try_init()
            .map_err(|e| {
                Error::Config(format!("failed to initialize telemetry subscriber: {e}"))
            })?;

        let resource = Resource::default().merge(&Resource::new(vec![
            KeyValue::new(ATTR_SERVICE_NAME, service_name.clone()),
            KeyValue::new(ATTR_SERVICE_NAMESPACE, "chunkvault"),
        ]));
        let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
        global::set_meter_provider(meter_provider.clone());

        info!(service_name = %service_name, "telemetry bootstrap initialized");

        Ok(Self {
            service_name,
            meter_provider,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.meter_provider.shutdown();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_parse() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level(" WARN ").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }
}
