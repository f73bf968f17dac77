use clap::Parser;

use std::path::PathBuf;

use super::config::{ExportProtocol, InstrumentStyle, NumericKind};
use super::constants::{
    ENV_EXPORT_PROTOCOL, ENV_INSTRUMENT_STYLE, ENV_NUMERIC_KIND, ENV_POST_FLUSH_GRACE_SECS,
};

#[derive(Parser)]
#[command(name = "metrics-relay")]
#[command(
    version,
    about = "Push one batch of samples to a remote metrics endpoint",
    long_about = None
)]
pub struct Cli {
    /// Request document to relay (reads stdin when omitted or `-`)
    #[arg(long, short = 'r')]
    pub request: Option<PathBuf>,

    /// Numeric kind of every value in the batch (float or int)
    #[arg(long, env = ENV_NUMERIC_KIND, default_value = "float", value_parser = parse_numeric_kind)]
    pub kind: NumericKind,

    /// Instrument style (recorder or observer)
    #[arg(long, env = ENV_INSTRUMENT_STYLE, default_value = "recorder", value_parser = parse_instrument_style)]
    pub style: InstrumentStyle,

    /// Wire protocol for the push (remote-write or otlp)
    #[arg(long, env = ENV_EXPORT_PROTOCOL, default_value = "remote-write", value_parser = parse_export_protocol)]
    pub protocol: ExportProtocol,

    /// Seconds to wait after a successful flush before returning
    #[arg(long = "grace-period", env = ENV_POST_FLUSH_GRACE_SECS, default_value_t = 0)]
    pub grace_period_secs: u64,
}

/// Parse numeric kind from CLI/env string
fn parse_numeric_kind(s: &str) -> Result<NumericKind, String> {
    match s.to_lowercase().as_str() {
        "float" | "f64" => Ok(NumericKind::Float),
        "int" | "integer" | "u64" => Ok(NumericKind::Int),
        _ => Err(format!(
            "Invalid numeric kind '{}'. Valid options: float, int",
            s
        )),
    }
}

/// Parse instrument style from CLI/env string
fn parse_instrument_style(s: &str) -> Result<InstrumentStyle, String> {
    match s.to_lowercase().as_str() {
        "recorder" => Ok(InstrumentStyle::Recorder),
        "observer" => Ok(InstrumentStyle::Observer),
        _ => Err(format!(
            "Invalid instrument style '{}'. Valid options: recorder, observer",
            s
        )),
    }
}

/// Parse export protocol from CLI/env string
fn parse_export_protocol(s: &str) -> Result<ExportProtocol, String> {
    match s.to_lowercase().as_str() {
        "remote-write" | "remote_write" | "prometheus" => Ok(ExportProtocol::RemoteWrite),
        "otlp" => Ok(ExportProtocol::Otlp),
        _ => Err(format!(
            "Invalid export protocol '{}'. Valid options: remote-write, otlp",
            s
        )),
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub request: Option<PathBuf>,
    pub kind: NumericKind,
    pub style: InstrumentStyle,
    pub protocol: ExportProtocol,
    pub grace_period_secs: u64,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            request: cli.request.filter(|path| path.as_os_str() != "-"),
            kind: cli.kind,
            style: cli.style,
            protocol: cli.protocol,
            grace_period_secs: cli.grace_period_secs,
        }
    }
}

/// Parse CLI arguments
pub fn parse() -> CliConfig {
    Cli::parse().into()
}
