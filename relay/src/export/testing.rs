//! Test helpers for inspecting what a session exported

use std::collections::BTreeMap;

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::InMemoryMetricExporter;
use opentelemetry_sdk::metrics::data::{Gauge, Histogram};

use super::error::RelayError;
use super::session::ExporterSession;
use crate::core::config::ExportConfig;
use crate::handler::SessionFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Histogram,
    Gauge,
}

/// One exported data point, flattened. `value` is the histogram sum or the gauge value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedPoint {
    pub name: String,
    pub kind: PointKind,
    pub count: u64,
    pub value: f64,
    pub attributes: BTreeMap<String, String>,
}

impl ExportedPoint {
    pub fn gauge(name: &str, value: f64, attributes: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            kind: PointKind::Gauge,
            count: 1,
            value,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

fn attribute_map(attributes: &[KeyValue]) -> BTreeMap<String, String> {
    attributes
        .iter()
        .map(|kv| (kv.key.to_string(), kv.value.as_str().into_owned()))
        .collect()
}

/// Points of the most recent export. Temporality is cumulative, so the last
/// export carries everything the session saw.
pub fn exported_points(exporter: &InMemoryMetricExporter) -> Vec<ExportedPoint> {
    let exports = exporter
        .get_finished_metrics()
        .expect("in-memory exporter readable");
    let Some(last) = exports.last() else {
        return Vec::new();
    };

    let mut points = Vec::new();
    for scope in &last.scope_metrics {
        for metric in &scope.metrics {
            let name = metric.name.to_string();
            let data = metric.data.as_any();
            if let Some(histogram) = data.downcast_ref::<Histogram<f64>>() {
                for dp in &histogram.data_points {
                    points.push(ExportedPoint {
                        name: name.clone(),
                        kind: PointKind::Histogram,
                        count: dp.count,
                        value: dp.sum,
                        attributes: attribute_map(&dp.attributes),
                    });
                }
            } else if let Some(histogram) = data.downcast_ref::<Histogram<u64>>() {
                for dp in &histogram.data_points {
                    points.push(ExportedPoint {
                        name: name.clone(),
                        kind: PointKind::Histogram,
                        count: dp.count,
                        value: dp.sum as f64,
                        attributes: attribute_map(&dp.attributes),
                    });
                }
            } else if let Some(gauge) = data.downcast_ref::<Gauge<f64>>() {
                for dp in &gauge.data_points {
                    points.push(ExportedPoint {
                        name: name.clone(),
                        kind: PointKind::Gauge,
                        count: 1,
                        value: dp.value,
                        attributes: attribute_map(&dp.attributes),
                    });
                }
            } else if let Some(gauge) = data.downcast_ref::<Gauge<u64>>() {
                for dp in &gauge.data_points {
                    points.push(ExportedPoint {
                        name: name.clone(),
                        kind: PointKind::Gauge,
                        count: 1,
                        value: dp.value as f64,
                        attributes: attribute_map(&dp.attributes),
                    });
                }
            }
        }
    }
    points
}

/// Opens sessions backed by a shared in-memory exporter
#[derive(Clone, Default)]
pub struct InMemorySessionFactory {
    pub exporter: InMemoryMetricExporter,
}

impl SessionFactory for InMemorySessionFactory {
    fn open(&self, config: &ExportConfig) -> Result<ExporterSession, RelayError> {
        Ok(ExporterSession::with_exporter(config, self.exporter.clone()))
    }
}
