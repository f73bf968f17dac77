//! Invocation handler
//!
//! Drives one full session lifecycle per request (prepare, start, dispatch,
//! stop) and maps the result onto the response shape the trigger expects.

use std::thread;

use crate::core::config::{ExportConfig, RelaySettings};
use crate::domain::{RelayRequest, RelayResponse, Sample};
use crate::export::{DispatchReport, ExporterSession, RelayError, prepare};

/// Opens export sessions. Every call must yield an independent session.
pub trait SessionFactory: Send + Sync {
    fn open(&self, config: &ExportConfig) -> Result<ExporterSession, RelayError>;
}

/// Sessions pushing to the configured endpoint in the configured protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteSessionFactory;

impl SessionFactory for RemoteSessionFactory {
    fn open(&self, config: &ExportConfig) -> Result<ExporterSession, RelayError> {
        ExporterSession::start(config)
    }
}

/// Response plus the causal result. Callers must check both.
#[derive(Debug)]
pub struct Outcome {
    pub response: RelayResponse,
    pub result: Result<DispatchReport, RelayError>,
}

impl Outcome {
    pub fn error(&self) -> Option<&RelayError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<RelayResponse, RelayError> {
        self.result.map(|_| self.response)
    }
}

pub struct InvocationHandler<F = RemoteSessionFactory> {
    settings: RelaySettings,
    factory: F,
}

impl InvocationHandler {
    pub fn new(settings: RelaySettings) -> Self {
        Self::with_factory(settings, RemoteSessionFactory)
    }
}

impl<F: SessionFactory> InvocationHandler<F> {
    pub fn with_factory(settings: RelaySettings, factory: F) -> Self {
        Self { settings, factory }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Relay one request. Any failure becomes 500/"error" with the error kept in `result`.
    pub fn handle(&self, request: &RelayRequest) -> Outcome {
        let result = self.send(&request.metrics);

        let response = match &result {
            Ok(report) => {
                tracing::info!(
                    samples = request.metrics.len(),
                    instruments = report.instruments.len(),
                    values = report.values,
                    "Batch relayed"
                );
                RelayResponse::ok()
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    transport = e.is_transport(),
                    samples = request.metrics.len(),
                    "Batch relay failed"
                );
                RelayResponse::error()
            }
        };

        Outcome { response, result }
    }

    fn send(&self, batch: &[Sample]) -> Result<DispatchReport, RelayError> {
        let prepared = prepare(self.settings.pipeline, batch)?;
        tracing::debug!(
            pipeline = %self.settings.pipeline,
            samples = prepared.len(),
            "Batch prepared"
        );

        let mut session = self.factory.open(&self.settings.export)?;
        let report = prepared.dispatch(&mut session)?;
        session.stop()?;

        let grace = self.settings.post_flush_grace;
        if !grace.is_zero() {
            tracing::debug!(grace_ms = grace.as_millis() as u64, "Waiting post-flush grace period");
            thread::sleep(grace);
        }

        Ok(report)
    }
}
