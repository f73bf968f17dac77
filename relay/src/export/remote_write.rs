//! Prometheus remote-write exporter
//!
//! Every collection becomes one `WriteRequest` (remote-write 0.1.0): protobuf
//! encoded, snappy block compressed and posted to the configured endpoint.
//! Gauges map to one series per data point. Histograms expand into the
//! classic `_bucket`/`_sum`/`_count` series with cumulative `le` buckets.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use opentelemetry::KeyValue;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::Temporality;
use opentelemetry_sdk::metrics::data::{Gauge, Histogram, ResourceMetrics};
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use prost::Message;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use super::error::RelayError;
use super::measure::Measure;
use crate::core::config::ExportConfig;
use crate::core::constants::{
    REMOTE_WRITE_USER_AGENT, REMOTE_WRITE_VERSION, REMOTE_WRITE_VERSION_HEADER,
};

const METRIC_NAME_LABEL: &str = "__name__";
const BUCKET_LABEL: &str = "le";

/// Wire messages of `prometheus/prompb/remote.proto` and `types.proto`
pub mod prompb {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct WriteRequest {
        #[prost(message, repeated, tag = "1")]
        pub timeseries: Vec<TimeSeries>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TimeSeries {
        /// Sorted by name
        #[prost(message, repeated, tag = "1")]
        pub labels: Vec<Label>,
        #[prost(message, repeated, tag = "2")]
        pub samples: Vec<Sample>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Label {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub value: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Sample {
        #[prost(double, tag = "1")]
        pub value: f64,
        /// Milliseconds since the Unix epoch
        #[prost(int64, tag = "2")]
        pub timestamp: i64,
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Replace characters outside `[a-zA-Z0-9_:]` and guard a leading digit
pub fn sanitize_metric_name(name: &str) -> String {
    sanitize(name, |c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Like [`sanitize_metric_name`] without `:`
pub fn sanitize_label_name(name: &str) -> String {
    sanitize(name, |c| c.is_ascii_alphanumeric() || c == '_')
}

fn sanitize(name: &str, allowed: impl Fn(char) -> bool) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if allowed(c) { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn timestamp_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Collects series for one request. Static labels are overridden by point attributes.
struct SeriesWriter<'a> {
    static_labels: &'a BTreeMap<String, String>,
    timeseries: Vec<prompb::TimeSeries>,
}

impl SeriesWriter<'_> {
    fn push(
        &mut self,
        name: &str,
        attributes: &[KeyValue],
        extra: Option<(&str, String)>,
        value: f64,
        timestamp: i64,
    ) {
        let mut labels = self.static_labels.clone();
        for kv in attributes {
            labels.insert(
                sanitize_label_name(kv.key.as_str()),
                kv.value.as_str().into_owned(),
            );
        }
        if let Some((key, value)) = extra {
            labels.insert(key.to_string(), value);
        }
        labels.insert(METRIC_NAME_LABEL.to_string(), name.to_string());

        self.timeseries.push(prompb::TimeSeries {
            labels: labels
                .into_iter()
                .map(|(name, value)| prompb::Label { name, value })
                .collect(),
            samples: vec![prompb::Sample { value, timestamp }],
        });
    }

    fn gauge<T: Measure>(&mut self, name: &str, gauge: &Gauge<T>) {
        let timestamp = timestamp_millis(gauge.time);
        for dp in &gauge.data_points {
            self.push(name, &dp.attributes, None, dp.value.to_f64(), timestamp);
        }
    }

    fn histogram<T: Measure>(&mut self, name: &str, histogram: &Histogram<T>) {
        let timestamp = timestamp_millis(histogram.time);
        let bucket_name = format!("{}_bucket", name);
        for dp in &histogram.data_points {
            let mut cumulative = 0;
            for (bound, count) in dp.bounds.iter().zip(&dp.bucket_counts) {
                cumulative += count;
                self.push(
                    &bucket_name,
                    &dp.attributes,
                    Some((BUCKET_LABEL, bound.to_string())),
                    cumulative as f64,
                    timestamp,
                );
            }
            self.push(
                &bucket_name,
                &dp.attributes,
                Some((BUCKET_LABEL, "+Inf".to_string())),
                dp.count as f64,
                timestamp,
            );
            self.push(
                &format!("{}_sum", name),
                &dp.attributes,
                None,
                dp.sum.to_f64(),
                timestamp,
            );
            self.push(
                &format!("{}_count", name),
                &dp.attributes,
                None,
                dp.count as f64,
                timestamp,
            );
        }
    }
}

/// Build the write request for one collection
pub fn write_request(
    metrics: &ResourceMetrics,
    static_labels: &BTreeMap<String, String>,
) -> prompb::WriteRequest {
    let mut writer = SeriesWriter {
        static_labels,
        timeseries: Vec::new(),
    };

    for scope in &metrics.scope_metrics {
        for metric in &scope.metrics {
            let name = sanitize_metric_name(&metric.name);
            let data = metric.data.as_any();
            if let Some(gauge) = data.downcast_ref::<Gauge<f64>>() {
                writer.gauge(&name, gauge);
            } else if let Some(gauge) = data.downcast_ref::<Gauge<u64>>() {
                writer.gauge(&name, gauge);
            } else if let Some(histogram) = data.downcast_ref::<Histogram<f64>>() {
                writer.histogram(&name, histogram);
            } else if let Some(histogram) = data.downcast_ref::<Histogram<u64>>() {
                writer.histogram(&name, histogram);
            } else {
                tracing::debug!(
                    metric = %metric.name,
                    "Skipping aggregation with no remote-write mapping"
                );
            }
        }
    }

    prompb::WriteRequest {
        timeseries: writer.timeseries,
    }
}

/// Protobuf-encode and snappy-compress a write request
pub fn encode_body(request: &prompb::WriteRequest) -> Result<Vec<u8>, snap::Error> {
    snap::raw::Encoder::new().compress_vec(&request.encode_to_vec())
}

// ============================================================================
// Exporter
// ============================================================================

pub struct RemoteWriteExporter {
    client: Client,
    endpoint: String,
    static_labels: BTreeMap<String, String>,
}

impl RemoteWriteExporter {
    pub fn new(config: &ExportConfig) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-protobuf"));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("snappy"));
        headers.insert(
            HeaderName::from_static(REMOTE_WRITE_VERSION_HEADER),
            HeaderValue::from_static(REMOTE_WRITE_VERSION),
        );
        for (name, value) in config.headers() {
            let name = HeaderName::try_from(name)
                .map_err(|e| RelayError::ConnectionSetup(e.to_string()))?;
            let mut value = HeaderValue::try_from(value)
                .map_err(|e| RelayError::ConnectionSetup(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        // The request may outlive the flush budget; the caller stops waiting
        // at the budget and reports a timeout.
        let client = Client::builder()
            .timeout(config.remote_timeout.saturating_mul(2))
            .user_agent(REMOTE_WRITE_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| RelayError::ConnectionSetup(e.to_string()))?;

        let static_labels = config
            .resource_attributes
            .iter()
            .map(|(k, v)| (sanitize_label_name(k), v.clone()))
            .collect();

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            static_labels,
        })
    }

    fn push(&self, request: &prompb::WriteRequest) -> Result<(), String> {
        let body = encode_body(request).map_err(|e| format!("snappy encoding failed: {}", e))?;
        let response = self
            .client
            .post(&self.endpoint)
            .body(body)
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().unwrap_or_default();
        Err(format!("remote write rejected with {}: {}", status, detail.trim()))
    }
}

#[async_trait]
impl PushMetricExporter for RemoteWriteExporter {
    async fn export(&self, metrics: &mut ResourceMetrics) -> OTelSdkResult {
        let request = write_request(metrics, &self.static_labels);
        if request.timeseries.is_empty() {
            return Ok(());
        }

        let series = request.timeseries.len();
        match self.push(&request) {
            Ok(()) => {
                tracing::debug!(series, endpoint = %self.endpoint, "Remote write accepted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, series, endpoint = %self.endpoint, "Remote write failed");
                Err(OTelSdkError::InternalFailure(e))
            }
        }
    }

    async fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown(&self) -> OTelSdkResult {
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}
