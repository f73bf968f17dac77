//! Instrument dispatch
//!
//! A batch is first converted to the pipeline's numeric kind (`prepare`), which
//! validates every sample before any session exists. The prepared batch is
//! then dispatched onto a session either as one record call per sample or as
//! one observer per distinct name.

use opentelemetry::KeyValue;
use opentelemetry::metrics::AsyncInstrument;

use super::error::RelayError;
use super::grouping::group_by_name;
use super::measure::Measure;
use super::session::{ExporterSession, MeterScope};
use crate::core::config::{InstrumentStyle, NumericKind, Pipeline};
use crate::core::constants::METER_NAME;
use crate::domain::Sample;

/// A sample converted to the pipeline's numeric kind
#[derive(Debug, Clone, PartialEq)]
pub struct Reading<T> {
    pub name: String,
    pub value: T,
    pub attributes: Vec<KeyValue>,
}

impl<T: Measure> Reading<T> {
    fn from_sample(sample: &Sample) -> Result<Self, RelayError> {
        Ok(Self {
            name: sample.name.clone(),
            value: T::from_sample(sample)?,
            attributes: sample.attributes(),
        })
    }
}

/// What one dispatch registered and emitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Instrument names in registration order
    pub instruments: Vec<String>,
    /// Values recorded, or scheduled for observation on the next collection
    pub values: usize,
}

/// Readings of one kind
#[derive(Debug, Clone, PartialEq)]
pub enum Readings {
    Float(Vec<Reading<f64>>),
    Int(Vec<Reading<u64>>),
}

/// A validated batch, ready to be dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch {
    style: InstrumentStyle,
    readings: Readings,
}

/// Convert every sample to the pipeline's numeric kind.
///
/// Fails on the first sample the kind cannot represent, so a bad batch never
/// reaches a session.
pub fn prepare(pipeline: Pipeline, batch: &[Sample]) -> Result<PreparedBatch, RelayError> {
    let readings = match pipeline.kind {
        NumericKind::Float => Readings::Float(convert(batch)?),
        NumericKind::Int => Readings::Int(convert(batch)?),
    };
    Ok(PreparedBatch {
        style: pipeline.style,
        readings,
    })
}

fn convert<T: Measure>(batch: &[Sample]) -> Result<Vec<Reading<T>>, RelayError> {
    batch.iter().map(Reading::from_sample).collect()
}

impl PreparedBatch {
    pub fn len(&self) -> usize {
        match &self.readings {
            Readings::Float(r) => r.len(),
            Readings::Int(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register instruments on `session` and hand them every reading
    pub fn dispatch(self, session: &mut ExporterSession) -> Result<DispatchReport, RelayError> {
        let mut scope = session.meter(METER_NAME);
        let values = match self.readings {
            Readings::Float(readings) => run(self.style, readings, &mut scope)?,
            Readings::Int(readings) => run(self.style, readings, &mut scope)?,
        };
        Ok(DispatchReport {
            instruments: session.instrument_names(),
            values,
        })
    }
}

fn run<T: Measure>(
    style: InstrumentStyle,
    readings: Vec<Reading<T>>,
    scope: &mut MeterScope<'_>,
) -> Result<usize, RelayError> {
    match style {
        InstrumentStyle::Recorder => record_all(readings, scope),
        InstrumentStyle::Observer => observe_grouped(readings, scope),
    }
}

/// One record call per reading, in batch order
fn record_all<T: Measure>(
    readings: Vec<Reading<T>>,
    scope: &mut MeterScope<'_>,
) -> Result<usize, RelayError> {
    for reading in &readings {
        scope.record(&reading.name, reading.value, &reading.attributes)?;
    }
    tracing::debug!(kind = T::KIND, values = readings.len(), "Recorded batch");
    Ok(readings.len())
}

/// One observer per distinct name, each owning its own group
fn observe_grouped<T: Measure>(
    readings: Vec<Reading<T>>,
    scope: &mut MeterScope<'_>,
) -> Result<usize, RelayError> {
    let values = readings.len();
    let groups = group_by_name(readings, |r| r.name.as_str());
    let names = groups.len();

    for group in groups {
        scope.observe(&group.name, group_callback(group.members))?;
    }
    tracing::debug!(kind = T::KIND, names, values, "Registered observers");
    Ok(values)
}

/// Callback that observes exactly the readings it was built with
fn group_callback<T: Measure>(
    members: Vec<Reading<T>>,
) -> impl Fn(&dyn AsyncInstrument<T>) + Send + Sync + 'static {
    move |observer| {
        for reading in &members {
            observer.observe(reading.value, &reading.attributes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ExportConfig;
    use crate::domain::SampleValue;
    use crate::export::testing::{ExportedPoint, PointKind, exported_points};
    use opentelemetry_sdk::metrics::InMemoryMetricExporter;

    fn sample(name: &str, value: f64, labels: &[(&str, &str)]) -> Sample {
        labels.iter().fold(
            Sample::new(name, SampleValue::Float(value)),
            |s, (k, v)| s.with_label(*k, *v),
        )
    }

    fn run_pipeline(
        pipeline: Pipeline,
        batch: &[Sample],
    ) -> (DispatchReport, Vec<ExportedPoint>) {
        let exporter = InMemoryMetricExporter::default();
        let mut session =
            ExporterSession::with_exporter(&ExportConfig::default(), exporter.clone());
        let report = prepare(pipeline, batch)
            .unwrap()
            .dispatch(&mut session)
            .unwrap();
        session.stop().unwrap();
        (report, exported_points(&exporter))
    }

    fn observer(kind: NumericKind) -> Pipeline {
        Pipeline::new(kind, InstrumentStyle::Observer)
    }

    fn recorder(kind: NumericKind) -> Pipeline {
        Pipeline::new(kind, InstrumentStyle::Recorder)
    }

    #[test]
    fn test_prepare_rejects_whole_batch_on_bad_int() {
        let batch = vec![
            sample("hits", 1.0, &[]),
            sample("hits", 2.5, &[]),
        ];
        let err = prepare(recorder(NumericKind::Int), &batch).unwrap_err();
        assert!(matches!(err, RelayError::InvalidSample { .. }));
        assert!(prepare(recorder(NumericKind::Float), &batch).is_ok());
    }

    #[test]
    fn test_recorder_records_every_sample() {
        let batch = vec![
            sample("latency", 10.0, &[("route", "/a")]),
            sample("latency", 20.0, &[("route", "/a")]),
            sample("latency", 5.0, &[("route", "/b")]),
            sample("errors", 1.0, &[]),
        ];
        let (report, points) = run_pipeline(recorder(NumericKind::Float), &batch);

        assert_eq!(report.values, 4);
        assert_eq!(report.instruments, vec!["latency", "errors"]);
        assert!(points.iter().all(|p| p.kind == PointKind::Histogram));
        let total: u64 = points.iter().map(|p| p.count).sum();
        assert_eq!(total, 4);

        let route_a = points
            .iter()
            .find(|p| {
                p.name == "latency"
                    && p.attributes.get("route").map(String::as_str) == Some("/a")
            })
            .unwrap();
        assert_eq!(route_a.count, 2);
        assert_eq!(route_a.value, 30.0);
    }

    #[test]
    fn test_int_recorder() {
        let batch = vec![
            Sample::new("bytes", SampleValue::Int(512)),
            Sample::new("bytes", SampleValue::Int(256)),
        ];
        let (report, points) = run_pipeline(recorder(NumericKind::Int), &batch);

        assert_eq!(report.values, 2);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].count, 2);
        assert_eq!(points[0].value, 768.0);
    }

    #[test]
    fn test_observer_single_instrument_per_name() {
        let batch = vec![
            sample("latency", 12.5, &[("route", "/a")]),
            sample("latency", 7.0, &[("route", "/b")]),
        ];
        let (report, mut points) = run_pipeline(observer(NumericKind::Float), &batch);

        assert_eq!(report.instruments, vec!["latency"]);
        assert_eq!(report.values, 2);

        points.sort_by(|a, b| a.attributes.cmp(&b.attributes));
        assert_eq!(
            points,
            vec![
                ExportedPoint::gauge("latency", 12.5, &[("route", "/a")]),
                ExportedPoint::gauge("latency", 7.0, &[("route", "/b")]),
            ]
        );
    }

    #[test]
    fn test_observer_groups_do_not_leak() {
        let batch = vec![
            sample("cpu", 0.5, &[("host", "a")]),
            sample("mem", 128.0, &[("host", "a")]),
            sample("cpu", 0.7, &[("host", "b")]),
            sample("disk", 3.0, &[("host", "a")]),
            sample("mem", 256.0, &[("host", "b")]),
        ];
        let (report, points) = run_pipeline(observer(NumericKind::Float), &batch);

        assert_eq!(report.instruments, vec!["cpu", "mem", "disk"]);
        assert_eq!(points.len(), batch.len());
        for s in &batch {
            let expected = ExportedPoint::gauge(
                &s.name,
                f64::from_sample(s).unwrap(),
                &[("host", s.labels["host"].as_str())],
            );
            assert!(points.contains(&expected), "missing {:?}", expected);
        }
        // Every point must come from its own name's group.
        for point in &points {
            let host = &point.attributes["host"];
            assert!(
                batch
                    .iter()
                    .any(|s| s.name == point.name && &s.labels["host"] == host)
            );
        }
    }

    #[test]
    fn test_int_observer() {
        let batch = vec![Sample::new("queue_depth", SampleValue::Int(9))];
        let (report, points) = run_pipeline(observer(NumericKind::Int), &batch);

        assert_eq!(report.instruments, vec!["queue_depth"]);
        assert_eq!(points, vec![ExportedPoint::gauge("queue_depth", 9.0, &[])]);
    }

    #[test]
    fn test_empty_batch_registers_nothing() {
        for pipeline in [
            recorder(NumericKind::Float),
            observer(NumericKind::Float),
            recorder(NumericKind::Int),
        ] {
            let (report, points) = run_pipeline(pipeline, &[]);
            assert_eq!(report, DispatchReport::default());
            assert!(points.is_empty());
        }
    }
}
