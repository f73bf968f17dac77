use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_ENDPOINT, ENV_ENDPOINT, ENV_PASSWORD, ENV_RESOURCE_ATTRIBUTES, ENV_USERNAME,
    PUSH_INTERVAL_SECS, REMOTE_TIMEOUT_SECS, RESOURCE_TAG_KEY, RESOURCE_TAG_VALUE,
};

// =============================================================================
// Numeric Kind Enum
// =============================================================================

/// Numeric kind every value of a batch is exported as
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NumericKind {
    #[default]
    Float,
    /// Non-negative whole numbers, exported as `u64`
    Int,
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericKind::Float => write!(f, "float"),
            NumericKind::Int => write!(f, "int"),
        }
    }
}

// =============================================================================
// Instrument Style Enum
// =============================================================================

/// How samples are handed to the export session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstrumentStyle {
    /// Synchronous histogram, one record call per sample
    #[default]
    Recorder,
    /// Observable gauge per name, values emitted on the collection tick
    Observer,
}

impl fmt::Display for InstrumentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentStyle::Recorder => write!(f, "recorder"),
            InstrumentStyle::Observer => write!(f, "observer"),
        }
    }
}

// =============================================================================
// Export Protocol Enum
// =============================================================================

/// Wire protocol spoken to the remote endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportProtocol {
    /// Prometheus remote write: snappy-compressed protobuf `WriteRequest`
    #[default]
    RemoteWrite,
    /// OTLP over HTTP with protobuf bodies
    Otlp,
}

impl fmt::Display for ExportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportProtocol::RemoteWrite => write!(f, "remote-write"),
            ExportProtocol::Otlp => write!(f, "otlp"),
        }
    }
}

/// Pipeline variant: numeric kind plus instrument style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub kind: NumericKind,
    pub style: InstrumentStyle,
}

impl Pipeline {
    pub fn new(kind: NumericKind, style: InstrumentStyle) -> Self {
        Self { kind, style }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.style)
    }
}

// =============================================================================
// Basic Auth
// =============================================================================

/// Basic-auth credentials for the remote endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    password: String,
}

impl BasicAuth {
    /// Build credentials only when both parts are present and non-empty.
    ///
    /// A lone username or password yields `None`; that is not an error.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self { username, password })
            }
            _ => None,
        }
    }

    /// Value for the `Authorization` header
    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Export Configuration
// =============================================================================

/// Configuration of one export session. Built once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub endpoint: String,
    pub protocol: ExportProtocol,
    pub remote_timeout: Duration,
    pub push_interval: Duration,
    pub basic_auth: Option<BasicAuth>,
    pub resource_attributes: Vec<(String, String)>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ExportConfig {
    /// Read `ENDPOINT`, `USERNAME`, `PASSWORD` and `RESOURCE_ATTRIBUTES` from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENV_ENDPOINT)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let username = lookup(ENV_USERNAME);
        let password = lookup(ENV_PASSWORD);
        let partial_credentials = username.is_some() || password.is_some();
        let basic_auth = BasicAuth::from_parts(username, password);
        if basic_auth.is_none() && partial_credentials {
            tracing::debug!("Incomplete basic-auth credentials, exporting without auth");
        }

        let mut resource_attributes =
            vec![(RESOURCE_TAG_KEY.to_string(), RESOURCE_TAG_VALUE.to_string())];
        if let Some(raw) = lookup(ENV_RESOURCE_ATTRIBUTES) {
            resource_attributes.extend(parse_resource_attributes(&raw));
        }

        Self {
            endpoint,
            protocol: ExportProtocol::default(),
            remote_timeout: Duration::from_secs(REMOTE_TIMEOUT_SECS),
            push_interval: Duration::from_secs(PUSH_INTERVAL_SECS),
            basic_auth,
            resource_attributes,
        }
    }

    pub fn with_protocol(mut self, protocol: ExportProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval = interval;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// HTTP headers sent with every export request
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(auth) = &self.basic_auth {
            headers.insert("Authorization".to_string(), auth.header_value());
        }
        headers
    }
}

/// Parse `key=value,key=value`. Malformed pairs are skipped.
pub fn parse_resource_attributes(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Some((key.trim().to_string(), value.trim().to_string()))
            }
            _ => {
                tracing::warn!(pair, "Ignoring malformed resource attribute");
                None
            }
        })
        .collect()
}

// =============================================================================
// Relay Settings
// =============================================================================

/// Everything one invocation needs, resolved up front
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelaySettings {
    pub export: ExportConfig,
    pub pipeline: Pipeline,
    /// Blocking wait after a successful flush before returning
    pub post_flush_grace: Duration,
}

impl RelaySettings {
    /// Combine environment export settings with CLI pipeline selection
    pub fn load(cli: &CliConfig) -> Self {
        let settings = Self {
            export: ExportConfig::from_env().with_protocol(cli.protocol),
            pipeline: Pipeline::new(cli.kind, cli.style),
            post_flush_grace: Duration::from_secs(cli.grace_period_secs),
        };
        tracing::debug!(
            endpoint = %settings.export.endpoint,
            protocol = %settings.export.protocol,
            pipeline = %settings.pipeline,
            auth = settings.export.basic_auth.is_some(),
            grace_secs = cli.grace_period_secs,
            "Relay settings loaded"
        );
        settings
    }
}
