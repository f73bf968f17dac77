//! Command-line invocation driver
//!
//! Reads one request document, relays it and prints the response document to
//! stdout. Logs go to stderr so stdout stays machine-readable.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::cli;
use crate::core::config::RelaySettings;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::domain::RelayRequest;
use crate::handler::InvocationHandler;

pub struct RelayApp;

impl RelayApp {
    /// Run one invocation with CLI argument parsing
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        let cli_config = cli::parse();
        tracing::trace!(config = ?cli_config, "Parsed command line");

        let settings = RelaySettings::load(&cli_config);
        let request = read_request(cli_config.request.as_deref())?;
        tracing::debug!(samples = request.metrics.len(), "Request loaded");

        let handler = InvocationHandler::new(settings);
        let outcome = handler.handle(&request);

        let document =
            serde_json::to_string(&outcome.response).context("Failed to encode response")?;
        println!("{}", document);

        outcome
            .into_result()
            .map(|_| ())
            .context("Metrics relay failed")
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(false)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

/// Read the request from `path`, or from stdin when `None`
pub fn read_request(path: Option<&Path>) -> Result<RelayRequest> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read request from stdin")?;
            raw
        }
    };
    parse_request(&raw)
}

/// Parse a request document. Blank input is an empty batch.
pub fn parse_request(raw: &str) -> Result<RelayRequest> {
    if raw.trim().is_empty() {
        return Ok(RelayRequest::default());
    }
    serde_json::from_str(raw).context("Invalid request document")
}
