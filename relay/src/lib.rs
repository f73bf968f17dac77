//! Invocation-scoped metrics relay.
//!
//! Accepts one batch of named, labeled samples, maps them onto OpenTelemetry
//! instruments and pushes them to a remote endpoint through a session that is
//! flushed and closed before the invocation returns.

pub mod app;
pub mod core;
pub mod domain;
pub mod export;
pub mod handler;

pub use domain::{RelayRequest, RelayResponse, Sample, SampleValue};
pub use export::{DispatchReport, ExporterSession, RelayError};
pub use handler::{InvocationHandler, RemoteSessionFactory, Outcome, SessionFactory};
