//! Process-wide named configuration.
//!
//! Every tunable is a string keyed by name. Components read the keys they
//! understand once, at construction, and parse them there.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Well-known configuration keys.
pub mod keys {
    /// Seconds a connection may stay idle before the host closes it.
    pub const IDLE_TIMEOUT_SECONDS: &str = "websocket.idle-timeout-seconds";
    /// Upper bound, in bytes, for both binary and text frame buffers.
    pub const MAX_BUFFER_SIZE_BYTES: &str = "websocket.max-buffer-size-bytes";
}

/// Named string configuration shared by the whole process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitParams {
    params: BTreeMap<String, String>,
}

impl InitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: InitParams) {
        self.params.extend(other.params);
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a single `key=value` pair as given on the command line.
    pub fn parse_pair(raw: &str) -> Result<(String, String), ConfigError> {
        match raw.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::MalformedPair(raw.to_string())),
        }
    }

    /// Parse a JSON object. Scalar values are stored in their textual form
    /// so `{"websocket.idle-timeout-seconds": 30}` and `"30"` are equivalent.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(json)?;
        let mut params = Self::new();
        for (key, value) in raw {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(ConfigError::UnsupportedValue(key)),
            };
            params.insert(key, text);
        }
        Ok(params)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Read `key` as a non-negative integer, `None` when absent.
    pub fn non_negative(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        self.parsed(key, |n: i64| n >= 0, "expected a non-negative integer")
            .map(|v| v.map(|n| n as u64))
    }

    /// Read `key` as a strictly positive integer, `None` when absent.
    pub fn positive(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        self.parsed(key, |n: i64| n > 0, "expected a positive integer")
            .map(|v| v.map(|n| n as usize))
    }

    fn parsed(
        &self,
        key: &str,
        accept: impl Fn(i64) -> bool,
        reason: &str,
    ) -> Result<Option<i64>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };
        let n: i64 = raw.trim().parse().map_err(|_| invalid())?;
        if accept(n) { Ok(Some(n)) } else { Err(invalid()) }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InitParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
