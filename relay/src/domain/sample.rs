//! Invocation payload types
//!
//! Field names follow the wire shape of the request (`Name`, `Value`, `Labels`)
//! and the response (`statusCode`, `body`).

use std::collections::BTreeMap;

use opentelemetry::KeyValue;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::constants::{BODY_ERROR, BODY_OK, STATUS_ERROR, STATUS_OK};

/// Numeric value as it arrived on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Int(i64),
    Float(f64),
}

/// One named, labeled measurement
///
/// Labels are a map, so a duplicated key in the request keeps whichever value
/// the JSON decoder saw last. Callers should not rely on that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Sample {
    pub name: String,
    pub value: SampleValue,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Sample {
    pub fn new(name: impl Into<String>, value: SampleValue) -> Self {
        Self {
            name: name.into(),
            value,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Labels as instrument attributes
    pub fn attributes(&self) -> Vec<KeyValue> {
        self.labels
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request delivered by the invocation trigger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub metrics: Vec<Sample>,
}

/// Response handed back to the invocation trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub status_code: u16,
    pub body: String,
}

impl RelayResponse {
    pub fn ok() -> Self {
        Self {
            status_code: STATUS_OK,
            body: BODY_OK.to_string(),
        }
    }

    pub fn error() -> Self {
        Self {
            status_code: STATUS_ERROR,
            body: BODY_ERROR.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}
