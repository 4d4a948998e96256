use std::path::Path;
use std::sync::Arc;

use fdp_types::{RegistryObjectRef, Table};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::query::QueryEncoder;
use crate::transport::{Method, RegistryRequest, RegistryTransport};

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_CONFLICT: u16 = 409;

/// Typed access to a data registry's REST API.
///
/// The root is normalised to end in `/`; every path is relative to it.
pub struct RegistryClient {
    root: String,
    token: Option<String>,
    transport: Arc<dyn RegistryTransport>,
    query: QueryEncoder,
}

impl RegistryClient {
    pub fn new(
        root: &str,
        token: Option<String>,
        transport: Arc<dyn RegistryTransport>,
    ) -> RegistryResult<Self> {
        if !(root.starts_with("http://") || root.starts_with("https://")) {
            return Err(RegistryError::InvalidRoot(root.to_string()));
        }
        let root = format!("{}/", root.trim_end_matches('/'));
        let query = QueryEncoder::new(&root)?;
        Ok(Self {
            root,
            token: token.filter(|t| !t.is_empty()),
            transport,
            query,
        })
    }

    /// The API root, always ending in `/`.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// GET `root + path`. Returns the `results` field of list responses,
    /// the whole body otherwise.
    pub fn get(&self, path: &str, expected: u16) -> RegistryResult<Value> {
        let url = format!("{}{}", self.root, path.trim_start_matches('/'));
        self.get_url(&url, expected)
    }

    pub fn get_by_id(&self, table: Table, id: u64, expected: u16) -> RegistryResult<Value> {
        self.get(&format!("{table}/{id}/"), expected)
    }

    /// Fetch the entity a reference points at.
    pub fn get_ref(&self, entity: &RegistryObjectRef) -> RegistryResult<Value> {
        self.get_url(entity.uri(), STATUS_OK)
    }

    /// Filtered list query. Returns the matching entities.
    pub fn query(
        &self,
        table: Table,
        filters: &Map<String, Value>,
        expected: u16,
    ) -> RegistryResult<Vec<Value>> {
        let query = self.query.encode(filters);
        let url = if query.is_empty() {
            format!("{}{table}/", self.root)
        } else {
            format!("{}{table}/?{query}", self.root)
        };
        match self.get_url(&url, expected)? {
            Value::Array(items) => Ok(items),
            other => Err(RegistryError::MalformedResponse {
                url,
                reason: format!("expected a list of results, got {}", json_kind(&other)),
            }),
        }
    }

    /// First entity matching the filters, if any.
    pub fn query_first(
        &self,
        table: Table,
        filters: &Map<String, Value>,
    ) -> RegistryResult<Option<Value>> {
        Ok(self.query(table, filters, STATUS_OK)?.into_iter().next())
    }

    /// Create-or-fetch. A `409 Conflict` is resolved by querying with the
    /// payload as filters and returning the first match.
    pub fn post(&self, table: Table, payload: &Value) -> RegistryResult<Value> {
        self.post_with_status(table, payload, STATUS_CREATED)
    }

    pub fn post_with_status(
        &self,
        table: Table,
        payload: &Value,
        expected: u16,
    ) -> RegistryResult<Value> {
        let url = format!("{}{table}/", self.root);
        let request = RegistryRequest::post(&url, payload.clone(), self.token.as_deref());
        let response = self.transport.send(&request)?;

        if response.status == STATUS_CONFLICT && expected != STATUS_CONFLICT {
            debug!(%table, "entity already exists, fetching it");
            let filters = payload.as_object().cloned().unwrap_or_default();
            return self
                .query_first(table, &filters)?
                .ok_or_else(|| RegistryError::ConflictUnresolved {
                    table: table.to_string(),
                });
        }
        if response.status != expected {
            return Err(RegistryError::UnexpectedStatus {
                method: Method::Post,
                url,
                expected,
                actual: response.status,
                body: response.body,
            });
        }
        debug!(%table, "created");
        parse_body(&url, &response.body)
    }

    /// Create-or-fetch a storage root. Local roots are sent as `file://` URLs,
    /// which is how the registry tells them apart from remote ones.
    pub fn post_storage_root(&self, payload: &Value) -> RegistryResult<Value> {
        let mut payload = payload.clone();
        let local = payload.get("local").and_then(Value::as_bool).unwrap_or(false);
        if local {
            if let Some(root) = payload.get("root").and_then(Value::as_str) {
                if !root.starts_with("file://") {
                    let prefixed = format!("file://{root}");
                    payload["root"] = Value::String(prefixed);
                }
            }
        }
        self.post(Table::StorageRoot, &payload)
    }

    /// Partial update of an existing entity.
    pub fn patch(&self, entity: &RegistryObjectRef, payload: &Value) -> RegistryResult<Value> {
        self.patch_with_status(entity, payload, STATUS_OK)
    }

    pub fn patch_with_status(
        &self,
        entity: &RegistryObjectRef,
        payload: &Value,
        expected: u16,
    ) -> RegistryResult<Value> {
        let url = format!("{}{}", self.root, entity.path());
        let request = RegistryRequest::patch(&url, payload.clone(), self.token.as_deref());
        let response = self.transport.send(&request)?;
        if response.status != expected {
            return Err(RegistryError::UnexpectedStatus {
                method: Method::Patch,
                url,
                expected,
                actual: response.status,
                body: response.body,
            });
        }
        parse_body(&url, &response.body)
    }

    /// Stream a remote file to `local_path`.
    pub fn download(&self, url: &str, local_path: &Path) -> RegistryResult<()> {
        self.transport.download(url, local_path)?;
        if !local_path.is_file() {
            return Err(RegistryError::DownloadFailed {
                url: url.to_string(),
                path: local_path.to_path_buf(),
                reason: "no file at destination after transfer".into(),
            });
        }
        Ok(())
    }

    /// The `url` field of an entity as a reference.
    pub fn entity_ref(entity: &Value) -> RegistryResult<RegistryObjectRef> {
        let url = entity
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistryError::MalformedResponse {
                url: String::new(),
                reason: "entity has no url field".into(),
            })?;
        Ok(RegistryObjectRef::parse(url)?)
    }

    fn get_url(&self, url: &str, expected: u16) -> RegistryResult<Value> {
        let request = RegistryRequest::get(url, self.token.as_deref());
        let response = self.transport.send(&request)?;
        if response.status != expected {
            return Err(RegistryError::UnexpectedStatus {
                method: Method::Get,
                url: url.to_string(),
                expected,
                actual: response.status,
                body: response.body,
            });
        }
        let mut body = parse_body(url, &response.body)?;
        match body.as_object_mut().and_then(|m| m.remove("results")) {
            Some(results) => Ok(results),
            None => Ok(body),
        }
    }
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("root", &self.root)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

fn parse_body(url: &str, body: &str) -> RegistryResult<Value> {
    serde_json::from_str(body).map_err(|e| RegistryError::MalformedResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
