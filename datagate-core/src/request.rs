//! Request and response shapes for specific-data queries.
//!
//! Only the parts needed to reason about cache keys and freshness are modeled
//! here. The payload itself is carried as opaque JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Caller identity attached to every query.
///
/// The core trusts any `SourceId` it receives: admission (format and
/// whitelist checks) happens before a request reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A parameterized "specific data" query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificDataRequest {
    /// Data family being queried; also selects the freshness rule.
    pub data_type: String,
    /// Query parameters. Ordering is irrelevant to cache identity.
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl SpecificDataRequest {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Canonical JSON form: object keys sorted at every depth.
    ///
    /// Two requests with the same data type and semantically equal parameters
    /// always normalize to the same string.
    pub fn normalized(&self) -> String {
        let mut root = serde_json::Map::new();
        root.insert(
            "dataType".to_string(),
            serde_json::Value::String(self.data_type.trim().to_string()),
        );
        let params = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>();
        root.insert("params".to_string(), serde_json::Value::Object(params));
        write_canonical(&serde_json::Value::Object(root))
    }
}

/// Serialize with sorted keys regardless of serde_json's map ordering feature.
fn write_canonical(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body = keys
                .into_iter()
                .map(|k| {
                    let key = serde_json::Value::String(k.clone()).to_string();
                    format!("{}:{}", key, write_canonical(&map[k]))
                })
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", body)
        }
        serde_json::Value::Array(items) => {
            let body = items
                .iter()
                .map(write_canonical)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{}]", body)
        }
        other => other.to_string(),
    }
}

/// Response returned by the remote data service and served from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificDataResponse {
    /// Opaque payload.
    pub data: serde_json::Value,
}

impl SpecificDataResponse {
    pub fn new(data: serde_json::Value) -> Self {
        Self { data }
    }
}
