//! Run configuration tree and the views `Config` reads from it.
//!
//! The YAML file is parsed once into a [`ConfigTree`]. `run_metadata` is
//! checked eagerly; `read` and `write` entries are looked up by data product
//! name when a run links them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, warn};

use fdp_types::DEFAULT_VERSION;

use crate::error::{SdkError, SdkResult};
use crate::paths::expand_home;

/// Which registry a run talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryLocation {
    Local,
    Remote,
}

impl RegistryLocation {
    /// The `run_metadata` key holding this registry's URL.
    pub fn url_key(&self) -> &'static str {
        match self {
            Self::Local => "local_data_registry_url",
            Self::Remote => "remote_data_registry_url",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// The `run_metadata` block, with every mandatory key present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    pub registry_url: String,
    pub write_data_store: PathBuf,
    pub default_input_namespace: String,
    pub default_output_namespace: String,
    pub latest_commit: String,
    pub remote_repo: String,
    pub description: String,
    /// Defaults to `true` when absent or unparsable.
    pub public: bool,
}

/// Optional `use:` overrides of a read or write entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UseBlock {
    pub version: Option<String>,
    pub data_product: Option<String>,
    pub namespace: Option<String>,
}

/// A `use:` block with defaults applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedUse {
    pub data_product: String,
    pub version: String,
    pub namespace: String,
}

impl UseBlock {
    /// Fill unset fields: version `0.0.1`, the logical name, and the given
    /// default namespace.
    pub fn resolve(&self, logical_name: &str, default_namespace: &str) -> ResolvedUse {
        let version = self.version.clone().unwrap_or_else(|| {
            debug!(data_product = logical_name, version = DEFAULT_VERSION, "no use.version, using default");
            DEFAULT_VERSION.to_string()
        });
        let data_product = self
            .data_product
            .clone()
            .unwrap_or_else(|| logical_name.to_string());
        let namespace = self.namespace.clone().unwrap_or_else(|| {
            debug!(data_product = logical_name, namespace = default_namespace, "no use.namespace, using default");
            default_namespace.to_string()
        });
        ResolvedUse {
            data_product,
            version,
            namespace,
        }
    }
}

/// One entry of the `write` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteEntry {
    pub data_product: String,
    pub description: String,
    /// File extension, no dot.
    pub file_type: String,
    pub public: Option<bool>,
    pub use_block: UseBlock,
}

/// One entry of the `read` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadEntry {
    pub data_product: String,
    pub use_block: UseBlock,
}

/// Parsed run configuration file.
#[derive(Clone, Debug)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            SdkError::ConfigParsing(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> SdkResult<Self> {
        let root: Value = serde_yaml::from_str(text)
            .map_err(|e| SdkError::ConfigParsing(format!("invalid YAML: {e}")))?;
        Ok(Self { root })
    }

    /// Extract and check `run_metadata`.
    pub fn run_metadata(&self, location: RegistryLocation) -> SdkResult<RunMetadata> {
        let block = self
            .root
            .get("run_metadata")
            .filter(|v| v.is_mapping())
            .ok_or_else(|| SdkError::missing_key("run_metadata"))?;
        let require = |key: &str| {
            block
                .get(key)
                .and_then(scalar)
                .ok_or_else(|| SdkError::missing_key(&format!("run_metadata.{key}")))
        };

        let registry_url = require(location.url_key())?;
        let write_data_store = expand_home(&require("write_data_store")?);
        let default_input_namespace = require("default_input_namespace")?;
        let default_output_namespace = require("default_output_namespace")?;
        let latest_commit = require("latest_commit")?;
        let remote_repo = require("remote_repo")?;
        let description = require("description")?;
        let public = parse_public(block.get("public"));

        Ok(RunMetadata {
            registry_url,
            write_data_store,
            default_input_namespace,
            default_output_namespace,
            latest_commit,
            remote_repo,
            description,
            public,
        })
    }

    /// The `write` entry for `data_product`.
    pub fn write_entry(&self, data_product: &str) -> SdkResult<WriteEntry> {
        let entry = find_entry(self.section("write")?, "write", data_product)?;
        let field = |key: &str| {
            entry.get(key).and_then(scalar).ok_or_else(|| {
                SdkError::ConfigParsing(format!(
                    "write entry `{data_product}` is missing `{key}`"
                ))
            })
        };
        Ok(WriteEntry {
            data_product: data_product.to_string(),
            description: field("description")?,
            file_type: field("file_type")?.trim_start_matches('.').to_string(),
            public: entry.get("public").and_then(Value::as_bool),
            use_block: use_block(entry),
        })
    }

    /// The `read` entry for `data_product`.
    pub fn read_entry(&self, data_product: &str) -> SdkResult<ReadEntry> {
        let entry = find_entry(self.section("read")?, "read", data_product)?;
        Ok(ReadEntry {
            data_product: data_product.to_string(),
            use_block: use_block(entry),
        })
    }

    /// Data product names declared under `write`, in file order.
    pub fn write_names(&self) -> Vec<String> {
        self.names("write")
    }

    /// Data product names declared under `read`, in file order.
    pub fn read_names(&self) -> Vec<String> {
        self.names("read")
    }

    fn section(&self, name: &str) -> SdkResult<&[Value]> {
        let section = self
            .root
            .get(name)
            .ok_or_else(|| SdkError::ConfigParsing(format!("no `{name}` section")))?;
        section
            .as_sequence()
            .map(Vec::as_slice)
            .ok_or_else(|| SdkError::ConfigParsing(format!("`{name}` section is not a list")))
    }

    fn names(&self, name: &str) -> Vec<String> {
        self.section(name)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("data_product").and_then(scalar))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_entry<'a>(entries: &'a [Value], section: &str, data_product: &str) -> SdkResult<&'a Value> {
    entries
        .iter()
        .find(|e| e.get("data_product").and_then(scalar).as_deref() == Some(data_product))
        .ok_or_else(|| {
            SdkError::ConfigParsing(format!("no `{section}` entry for data product `{data_product}`"))
        })
}

fn use_block(entry: &Value) -> UseBlock {
    let Some(block) = entry.get("use") else {
        return UseBlock::default();
    };
    UseBlock {
        version: block.get("version").and_then(scalar),
        data_product: block.get("data_product").and_then(scalar),
        namespace: block.get("namespace").and_then(scalar),
    }
}

/// String form of a YAML scalar.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_public(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
        Some(other) => {
            warn!(value = ?other, "run_metadata.public is not a boolean, defaulting to true");
            true
        }
    }
}
