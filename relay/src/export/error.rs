//! Relay error types

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Export pipeline setup failed: {0}")]
    ConnectionSetup(String),

    #[error("Flush did not complete within {0:?}")]
    FlushTimeout(Duration),

    #[error("Flush failed: {0}")]
    Flush(String),

    #[error("Instrument '{name}' is already registered as {existing}")]
    DuplicateInstrument { name: String, existing: &'static str },

    #[error("Invalid sample '{name}': {reason}")]
    InvalidSample { name: String, reason: String },
}

impl RelayError {
    /// Failure talking to the remote endpoint, as opposed to a bad batch
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionSetup(_) | Self::FlushTimeout(_) | Self::Flush(_)
        )
    }
}
