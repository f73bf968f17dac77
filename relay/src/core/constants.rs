// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for log filters and identifiers)
pub const APP_NAME_LOWER: &str = "metrics_relay";

/// Instrumentation scope name used for every instrument a session registers
pub const METER_NAME: &str = "metrics-relay";

// =============================================================================
// Environment Variables - Export
// =============================================================================

/// Environment variable for the remote write endpoint
pub const ENV_ENDPOINT: &str = "ENDPOINT";

/// Environment variable for the basic-auth username
pub const ENV_USERNAME: &str = "USERNAME";

/// Environment variable for the basic-auth password
pub const ENV_PASSWORD: &str = "PASSWORD";

/// Environment variable selecting the wire protocol (`remote-write` or `otlp`)
pub const ENV_EXPORT_PROTOCOL: &str = "EXPORT_PROTOCOL";

/// Environment variable for extra static resource tags (`key=value,key=value`)
pub const ENV_RESOURCE_ATTRIBUTES: &str = "RESOURCE_ATTRIBUTES";

// =============================================================================
// Environment Variables - Pipeline
// =============================================================================

/// Environment variable selecting the numeric kind (`float` or `int`)
pub const ENV_NUMERIC_KIND: &str = "NUMERIC_KIND";

/// Environment variable selecting the instrument style (`recorder` or `observer`)
pub const ENV_INSTRUMENT_STYLE: &str = "INSTRUMENT_STYLE";

/// Environment variable for the post-flush grace period in seconds
pub const ENV_POST_FLUSH_GRACE_SECS: &str = "POST_FLUSH_GRACE_SECS";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "RELAY_LOG";

// =============================================================================
// Export Defaults
// =============================================================================

/// Endpoint used when `ENDPOINT` is unset or blank
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9090/api/v1/write";

/// Budget for a single remote request and for the final flush
pub const REMOTE_TIMEOUT_SECS: u64 = 10;

/// Collection cadence of the periodic reader
pub const PUSH_INTERVAL_SECS: u64 = 2;

/// Static resource tag attached to every export
pub const RESOURCE_TAG_KEY: &str = "service.name";
pub const RESOURCE_TAG_VALUE: &str = "metrics-relay";

// =============================================================================
// Remote Write
// =============================================================================

/// Protocol revision announced on every remote-write request
pub const REMOTE_WRITE_VERSION: &str = "0.1.0";

/// Header carrying [`REMOTE_WRITE_VERSION`]
pub const REMOTE_WRITE_VERSION_HEADER: &str = "x-prometheus-remote-write-version";

/// `User-Agent` of remote-write requests
pub const REMOTE_WRITE_USER_AGENT: &str = concat!("metrics-relay/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Invocation Responses
// =============================================================================

pub const STATUS_OK: u16 = 200;
pub const STATUS_ERROR: u16 = 500;
pub const BODY_OK: &str = "ok";
pub const BODY_ERROR: &str = "error";
