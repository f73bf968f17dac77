//! Metric model carried by one invocation

mod sample;

pub use sample::{RelayRequest, RelayResponse, Sample, SampleValue};
