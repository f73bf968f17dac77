//! Exporter session
//!
//! One session wraps one meter provider wired to the remote endpoint plus the
//! registry of instruments created through it. Sessions are created per
//! invocation and consumed by [`ExporterSession::stop`]; nothing is installed
//! globally.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{AsyncInstrument, Histogram, Meter, MeterProvider as _, ObservableGauge};
use opentelemetry_otlp::{MetricExporter, Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

use super::error::RelayError;
use super::measure::Measure;
use super::remote_write::RemoteWriteExporter;
use crate::core::config::{ExportConfig, ExportProtocol};

// ============================================================================
// Instruments
// ============================================================================

/// Instrument handle owned by a session registry
pub enum Instrument {
    F64Recorder(Histogram<f64>),
    U64Recorder(Histogram<u64>),
    // Observer callbacks live in the provider; the handle is kept so the
    // registry owns every instrument it created.
    F64Observer(ObservableGauge<f64>),
    U64Observer(ObservableGauge<u64>),
}

impl Instrument {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::F64Recorder(_) => "f64 recorder",
            Self::U64Recorder(_) => "u64 recorder",
            Self::F64Observer(_) => "f64 observer",
            Self::U64Observer(_) => "u64 observer",
        }
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F64Recorder(handle) => fmt::Debug::fmt(handle, f),
            Self::U64Recorder(handle) => fmt::Debug::fmt(handle, f),
            Self::F64Observer(handle) => fmt::Debug::fmt(handle, f),
            Self::U64Observer(handle) => fmt::Debug::fmt(handle, f),
        }
    }
}

/// Instruments by name, in registration order
#[derive(Default)]
struct InstrumentRegistry {
    index: HashMap<String, usize>,
    entries: Vec<(String, Instrument)>,
}

impl InstrumentRegistry {
    fn get(&self, name: &str) -> Option<&Instrument> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    fn insert(&mut self, name: &str, instrument: Instrument) {
        tracing::trace!(name, ?instrument, "Instrument registered");
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push((name.to_string(), instrument));
    }

    fn get_or_insert_with<F>(&mut self, name: &str, create: F) -> &Instrument
    where
        F: FnOnce() -> Instrument,
    {
        let i = match self.index.get(name) {
            Some(&i) => i,
            None => {
                self.insert(name, create());
                self.entries.len() - 1
            }
        };
        &self.entries[i].1
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Named instrument scope handed out by [`ExporterSession::meter`]
pub struct MeterScope<'a> {
    meter: Meter,
    registry: &'a mut InstrumentRegistry,
}

impl MeterScope<'_> {
    /// Record one value on the recorder for `name`, creating it on first use.
    ///
    /// Fails if `name` already belongs to an instrument of another type.
    pub fn record<T: Measure>(
        &mut self,
        name: &str,
        value: T,
        attributes: &[KeyValue],
    ) -> Result<(), RelayError> {
        let meter = &self.meter;
        let instrument = self
            .registry
            .get_or_insert_with(name, || T::recorder(meter, name));
        match T::as_recorder(instrument) {
            Some(histogram) => {
                histogram.record(value, attributes);
                Ok(())
            }
            None => Err(RelayError::DuplicateInstrument {
                name: name.to_string(),
                existing: instrument.describe(),
            }),
        }
    }

    /// Register the single observer for `name`. A second registration is rejected.
    pub fn observe<T, F>(&mut self, name: &str, callback: F) -> Result<(), RelayError>
    where
        T: Measure,
        F: Fn(&dyn AsyncInstrument<T>) + Send + Sync + 'static,
    {
        if let Some(existing) = self.registry.get(name) {
            return Err(RelayError::DuplicateInstrument {
                name: name.to_string(),
                existing: existing.describe(),
            });
        }
        let instrument = T::observer(&self.meter, name, callback);
        self.registry.insert(name, instrument);
        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct ExporterSession {
    provider: SdkMeterProvider,
    registry: InstrumentRegistry,
    remote_timeout: Duration,
}

impl ExporterSession {
    /// Open a session that pushes to `config.endpoint` in `config.protocol`.
    ///
    /// Basic auth is attached only when the config carries complete credentials.
    pub fn start(config: &ExportConfig) -> Result<Self, RelayError> {
        validate_endpoint(&config.endpoint)?;

        let session = match config.protocol {
            ExportProtocol::RemoteWrite => {
                Self::with_exporter(config, RemoteWriteExporter::new(config)?)
            }
            ExportProtocol::Otlp => Self::with_exporter(config, otlp_exporter(config)?),
        };

        tracing::debug!(
            endpoint = %config.endpoint,
            protocol = %config.protocol,
            auth = config.basic_auth.is_some(),
            interval_ms = config.push_interval.as_millis() as u64,
            "Export session started"
        );
        Ok(session)
    }

    /// Open a session on top of any push exporter
    pub fn with_exporter<E>(config: &ExportConfig, exporter: E) -> Self
    where
        E: PushMetricExporter,
    {
        let reader = PeriodicReader::builder(exporter)
            .with_interval(config.push_interval)
            .build();

        let resource = Resource::builder()
            .with_attributes(
                config
                    .resource_attributes
                    .iter()
                    .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
            )
            .build();

        let provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .build();

        Self {
            provider,
            registry: InstrumentRegistry::default(),
            remote_timeout: config.remote_timeout,
        }
    }

    /// Instrument scope named `scope`, sharing this session's registry
    pub fn meter(&mut self, scope: &'static str) -> MeterScope<'_> {
        MeterScope {
            meter: self.provider.meter(scope),
            registry: &mut self.registry,
        }
    }

    /// Registered instrument names, in registration order
    pub fn instrument_names(&self) -> Vec<String> {
        self.registry.names().map(str::to_string).collect()
    }

    pub fn instrument_count(&self) -> usize {
        self.registry.len()
    }

    /// Flush everything recorded or observable and release the session.
    ///
    /// Observer callbacks run here, during the final collection. Waits at most
    /// the remote timeout; failures are returned, never retried.
    pub fn stop(self) -> Result<(), RelayError> {
        let Self {
            provider,
            registry,
            remote_timeout,
        } = self;
        let instruments = registry.len();
        drop(registry);

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("relay-flush".to_string())
            .spawn(move || {
                let result = provider.shutdown().map_err(|e| e.to_string());
                let _ = tx.send(result);
            })
            .map_err(|e| RelayError::Flush(format!("failed to spawn flush thread: {}", e)))?;

        match rx.recv_timeout(remote_timeout) {
            Ok(Ok(())) => {
                tracing::debug!(instruments, "Export session flushed");
                Ok(())
            }
            Ok(Err(e)) => Err(RelayError::Flush(e)),
            Err(RecvTimeoutError::Timeout) => Err(RelayError::FlushTimeout(remote_timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(RelayError::Flush("flush thread exited without a result".to_string()))
            }
        }
    }
}

fn otlp_exporter(config: &ExportConfig) -> Result<MetricExporter, RelayError> {
    let mut builder = MetricExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(config.endpoint.clone())
        .with_timeout(config.remote_timeout);

    let headers = config.headers();
    if !headers.is_empty() {
        builder = builder.with_headers(headers);
    }

    builder
        .build()
        .map_err(|e| RelayError::ConnectionSetup(e.to_string()))
}

fn validate_endpoint(endpoint: &str) -> Result<(), RelayError> {
    let rest = endpoint
        .strip_prefix("http://")
        .or_else(|| endpoint.strip_prefix("https://"))
        .ok_or_else(|| {
            RelayError::ConnectionSetup(format!(
                "endpoint '{}' must start with http:// or https://",
                endpoint
            ))
        })?;
    if rest.is_empty() || rest.starts_with('/') || rest.contains(char::is_whitespace) {
        return Err(RelayError::ConnectionSetup(format!(
            "endpoint '{}' has no valid host",
            endpoint
        )));
    }
    Ok(())
}
