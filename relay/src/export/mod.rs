//! Export pipeline: session lifecycle, numeric kinds, grouping, dispatch and
//! the remote-write encoding

mod dispatch;
mod error;
mod grouping;
mod measure;
mod remote_write;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{DispatchReport, PreparedBatch, Reading, Readings, prepare};
pub use error::RelayError;
pub use grouping::{Group, group_by_name};
pub use measure::Measure;
pub use remote_write::{RemoteWriteExporter, encode_body, prompb, write_request};
pub use session::{ExporterSession, Instrument, MeterScope};
