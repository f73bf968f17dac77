//! Numeric kinds the pipeline can export
//!
//! `Measure` binds a Rust number type to its instruments so the dispatcher
//! is written once and monomorphised per kind.

use opentelemetry::metrics::{AsyncInstrument, Histogram, Meter};

use super::error::RelayError;
use super::session::Instrument;
use crate::domain::{Sample, SampleValue};

pub trait Measure: Copy + Send + Sync + 'static {
    /// Short name of the kind, used in error messages
    const KIND: &'static str;

    /// Convert a wire value, rejecting what the kind cannot represent
    fn from_sample(sample: &Sample) -> Result<Self, RelayError>;

    /// Value as a remote-write sample value
    fn to_f64(self) -> f64;

    fn recorder(meter: &Meter, name: &str) -> Instrument;

    fn as_recorder(instrument: &Instrument) -> Option<&Histogram<Self>>;

    fn observer<F>(meter: &Meter, name: &str, callback: F) -> Instrument
    where
        F: Fn(&dyn AsyncInstrument<Self>) + Send + Sync + 'static;
}

impl Measure for f64 {
    const KIND: &'static str = "f64";

    fn from_sample(sample: &Sample) -> Result<Self, RelayError> {
        Ok(match sample.value {
            SampleValue::Int(v) => v as f64,
            SampleValue::Float(v) => v,
        })
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn recorder(meter: &Meter, name: &str) -> Instrument {
        Instrument::F64Recorder(meter.f64_histogram(name.to_string()).build())
    }

    fn as_recorder(instrument: &Instrument) -> Option<&Histogram<Self>> {
        match instrument {
            Instrument::F64Recorder(histogram) => Some(histogram),
            _ => None,
        }
    }

    fn observer<F>(meter: &Meter, name: &str, callback: F) -> Instrument
    where
        F: Fn(&dyn AsyncInstrument<Self>) + Send + Sync + 'static,
    {
        Instrument::F64Observer(
            meter
                .f64_observable_gauge(name.to_string())
                .with_callback(callback)
                .build(),
        )
    }
}

impl Measure for u64 {
    const KIND: &'static str = "u64";

    fn from_sample(sample: &Sample) -> Result<Self, RelayError> {
        let invalid = |reason: String| RelayError::InvalidSample {
            name: sample.name.clone(),
            reason,
        };
        match sample.value {
            SampleValue::Int(v) => {
                u64::try_from(v).map_err(|_| invalid(format!("{} is negative", v)))
            }
            SampleValue::Float(v) if v.fract() == 0.0 && v >= 0.0 && v <= u64::MAX as f64 => {
                Ok(v as u64)
            }
            SampleValue::Float(v) => Err(invalid(format!(
                "{} is not a non-negative whole number",
                v
            ))),
        }
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn recorder(meter: &Meter, name: &str) -> Instrument {
        Instrument::U64Recorder(meter.u64_histogram(name.to_string()).build())
    }

    fn as_recorder(instrument: &Instrument) -> Option<&Histogram<Self>> {
        match instrument {
            Instrument::U64Recorder(histogram) => Some(histogram),
            _ => None,
        }
    }

    fn observer<F>(meter: &Meter, name: &str, callback: F) -> Instrument
    where
        F: Fn(&dyn AsyncInstrument<Self>) + Send + Sync + 'static,
    {
        Instrument::U64Observer(
            meter
                .u64_observable_gauge(name.to_string())
                .with_callback(callback)
                .build(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_widens_integers() {
        let sample = Sample::new("a", SampleValue::Int(7));
        assert_eq!(f64::from_sample(&sample).unwrap(), 7.0);
        let sample = Sample::new("a", SampleValue::Float(-2.5));
        assert_eq!(f64::from_sample(&sample).unwrap(), -2.5);
    }

    #[test]
    fn test_u64_accepts_whole_numbers() {
        assert_eq!(
            u64::from_sample(&Sample::new("a", SampleValue::Int(42))).unwrap(),
            42
        );
        assert_eq!(
            u64::from_sample(&Sample::new("a", SampleValue::Float(3.0))).unwrap(),
            3
        );
    }

    #[test]
    fn test_u64_rejects_negative_and_fractional() {
        let err = u64::from_sample(&Sample::new("hits", SampleValue::Int(-1))).unwrap_err();
        assert!(matches!(err, RelayError::InvalidSample { ref name, .. } if name == "hits"));
        assert!(u64::from_sample(&Sample::new("hits", SampleValue::Float(1.5))).is_err());
        assert!(u64::from_sample(&Sample::new("hits", SampleValue::Float(-4.0))).is_err());
    }
}
