use std::borrow::Cow;

use regex::Regex;
use serde_json::{Map, Value};
use urlencoding::encode;

use crate::error::{RegistryError, RegistryResult};

/// Builds registry query strings from JSON filter maps.
///
/// Values that are entity URLs under the registry root are reduced to their
/// bare numeric id, so `storage_root=<root>/storage_root/4/` is sent as
/// `storage_root=4`. Array values expand to repeated `key=value` pairs.
#[derive(Clone, Debug)]
pub struct QueryEncoder {
    entity_url: Regex,
}

impl QueryEncoder {
    /// Encoder for entity URLs under `root` (a trailing slash is assumed).
    pub fn new(root: &str) -> RegistryResult<Self> {
        let root = root.trim_end_matches('/');
        let pattern = format!(r"^{}/[A-Za-z_]+/(\d+)/?$", regex::escape(root));
        let entity_url =
            Regex::new(&pattern).map_err(|_| RegistryError::InvalidRoot(root.to_string()))?;
        Ok(Self { entity_url })
    }

    /// Reduce an entity URL to its id; other strings pass through.
    pub fn reduce<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self.entity_url.captures(value).and_then(|c| c.get(1)) {
            Some(id) => Cow::Owned(id.as_str().to_string()),
            None => Cow::Borrowed(value),
        }
    }

    /// Encode a filter map as `k=v&k=v`. Null and nested-object values are
    /// skipped.
    pub fn encode(&self, filters: &Map<String, Value>) -> String {
        let mut pairs = Vec::new();
        for (key, value) in filters {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(v) = self.scalar(item) {
                            pairs.push(format!("{}={}", encode(key), encode(&v)));
                        }
                    }
                }
                other => {
                    if let Some(v) = self.scalar(other) {
                        pairs.push(format!("{}={}", encode(key), encode(&v)));
                    }
                }
            }
        }
        pairs.join("&")
    }

    fn scalar(&self, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(self.reduce(s).into_owned()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}
