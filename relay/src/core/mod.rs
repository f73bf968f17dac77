//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;

pub use crate::app::RelayApp;
pub use cli::CliConfig;
pub use config::{
    BasicAuth, ExportConfig, ExportProtocol, InstrumentStyle, NumericKind, Pipeline, RelaySettings,
};
