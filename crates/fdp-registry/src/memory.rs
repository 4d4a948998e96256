use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use fdp_types::{RegistryObjectRef, Table};
use serde_json::{json, Map, Value};

use crate::error::{RegistryError, RegistryResult};
use crate::transport::{Method, RegistryRequest, RegistryResponse, RegistryTransport};

/// In-memory registry speaking the same REST dialect as the real service.
///
/// Intended for tests and embedding. Entities live in per-table vectors
/// behind an `RwLock`; clones share state, so a test can hand one clone to
/// the client and inspect another afterwards.
///
/// Behaviour mirrored from the registry:
/// - list responses are `{"count", "next", "previous", "results"}`
/// - every entity gets `id` and `url` fields
/// - creating an `object` also creates its `whole_object` component
/// - POSTs that collide on a table's unique fields answer `409`
/// - filters on reference fields accept the bare id
#[derive(Clone)]
pub struct InMemoryRegistry {
    root: String,
    state: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<Table, Vec<Map<String, Value>>>,
    blobs: HashMap<String, Vec<u8>>,
    requests: Vec<(Method, String)>,
    required_token: Option<String>,
}

/// Fields that must be unique together per table.
fn unique_fields(table: Table) -> &'static [&'static str] {
    match table {
        Table::Users => &["username"],
        Table::UserAuthor => &["user"],
        Table::StorageRoot => &["root"],
        Table::StorageLocation => &["path", "hash", "public", "storage_root"],
        Table::FileType => &["extension"],
        Table::ObjectComponent => &["object", "name"],
        Table::Namespace => &["name"],
        Table::DataProduct => &["name", "version", "namespace"],
        Table::CodeRun => &["uuid"],
        Table::Author | Table::Object => &[],
    }
}

impl InMemoryRegistry {
    /// Create an empty registry served under `root`.
    pub fn new(root: &str) -> Self {
        Self {
            root: format!("{}/", root.trim_end_matches('/')),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Create a registry with an `admin` user linked to an author, the
    /// state a registry is in after its init step.
    pub fn with_admin(root: &str, author_name: &str) -> Self {
        let registry = Self::new(root);
        let user = registry.insert(Table::Users, json!({"username": "admin"}));
        let author = registry.insert(Table::Author, json!({"name": author_name}));
        registry.insert(
            Table::UserAuthor,
            json!({"user": user.uri(), "author": author.uri()}),
        );
        registry
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Insert an entity directly, bypassing unique checks.
    pub fn insert(&self, table: Table, fields: Value) -> RegistryObjectRef {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut state = self.state.write().expect("lock poisoned");
        let row = self.create(&mut state, table, fields);
        RegistryObjectRef::from_parts(&self.root, table.as_str(), row_id(&row))
    }

    /// Snapshot of every entity in a table.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        let state = self.state.read().expect("lock poisoned");
        state
            .tables
            .get(&table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Entities whose `field` equals `value`.
    pub fn find(&self, table: Table, field: &str, value: &Value) -> Vec<Value> {
        self.rows(table)
            .into_iter()
            .filter(|row| row.get(field).is_some_and(|v| same_value(v, value)))
            .collect()
    }

    /// Fetch one entity by reference.
    pub fn entity(&self, entity: &RegistryObjectRef) -> Option<Value> {
        let table = Table::from_str(entity.table()).ok()?;
        let state = self.state.read().expect("lock poisoned");
        state
            .tables
            .get(&table)?
            .iter()
            .find(|row| row_id(row) == entity.id())
            .cloned()
            .map(Value::Object)
    }

    /// Make `bytes` downloadable from `url`.
    pub fn serve_file(&self, url: &str, bytes: Vec<u8>) {
        let mut state = self.state.write().expect("lock poisoned");
        state.blobs.insert(url.to_string(), bytes);
    }

    /// Reject requests whose token differs from `token` with `401`.
    pub fn require_token(&self, token: &str) {
        let mut state = self.state.write().expect("lock poisoned");
        state.required_token = Some(token.to_string());
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.read().expect("lock poisoned").requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.read().expect("lock poisoned").requests.len()
    }

    fn create(&self, state: &mut State, table: Table, mut fields: Map<String, Value>) -> Map<String, Value> {
        let id = state.tables.get(&table).map_or(0, Vec::len) as u64 + 1;
        let url = RegistryObjectRef::from_parts(&self.root, table.as_str(), id);
        fields.insert("id".into(), json!(id));
        fields.insert("url".into(), json!(url.uri()));

        if table == Table::Object {
            let mut component = Map::new();
            component.insert("name".into(), json!("whole_object"));
            component.insert("whole_object".into(), json!(true));
            component.insert("object".into(), json!(url.uri()));
            let component = self.create(state, Table::ObjectComponent, component);
            fields.insert("components".into(), json!([component["url"].clone()]));
        }

        state.tables.entry(table).or_default().push(fields.clone());
        fields
    }

    fn handle(&self, request: &RegistryRequest) -> (u16, Value) {
        let mut state = self.state.write().expect("lock poisoned");
        state.requests.push((request.method, request.url.clone()));

        if let Some(required) = &state.required_token {
            if request.auth_token() != Some(required.as_str()) {
                return (401, json!({"detail": "Invalid token."}));
            }
        }

        let Some(rest) = request.url.strip_prefix(&self.root) else {
            return not_found();
        };
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut segments = path.trim_matches('/').split('/');
        let Some(table) = segments.next().and_then(|t| Table::from_str(t).ok()) else {
            return not_found();
        };
        let id = match segments.next() {
            None => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => return not_found(),
            },
        };

        match (request.method, id) {
            (Method::Get, None) => {
                let Some(filters) = parse_query(query) else {
                    return (400, json!({"detail": "malformed query string"}));
                };
                let results: Vec<Value> = state
                    .tables
                    .get(&table)
                    .into_iter()
                    .flatten()
                    .filter(|row| row_matches(row, &filters))
                    .cloned()
                    .map(Value::Object)
                    .collect();
                (
                    200,
                    json!({"count": results.len(), "next": null, "previous": null, "results": results}),
                )
            }
            (Method::Get, Some(id)) => match find_row(&state, table, id) {
                Some(row) => (200, Value::Object(row.clone())),
                None => not_found(),
            },
            (Method::Post, None) => {
                let Some(Value::Object(fields)) = request.body.clone() else {
                    return (400, json!({"detail": "expected a JSON object"}));
                };
                if conflicts(&state, table, &fields) {
                    return (
                        409,
                        json!({"detail": format!("{table} with these fields already exists")}),
                    );
                }
                let row = self.create(&mut state, table, fields);
                (201, Value::Object(row))
            }
            (Method::Patch, Some(id)) => {
                let Some(Value::Object(fields)) = request.body.clone() else {
                    return (400, json!({"detail": "expected a JSON object"}));
                };
                let Some(row) = state
                    .tables
                    .get_mut(&table)
                    .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == id))
                else {
                    return not_found();
                };
                for (key, value) in fields {
                    if key != "id" && key != "url" {
                        row.insert(key, value);
                    }
                }
                (200, Value::Object(row.clone()))
            }
            _ => (405, json!({"detail": "method not allowed"})),
        }
    }
}

impl RegistryTransport for InMemoryRegistry {
    fn send(&self, request: &RegistryRequest) -> RegistryResult<RegistryResponse> {
        let (status, body) = self.handle(request);
        Ok(RegistryResponse {
            status,
            body: body.to_string(),
        })
    }

    fn download(&self, url: &str, dest: &Path) -> RegistryResult<()> {
        let blob = {
            let mut state = self.state.write().expect("lock poisoned");
            state.requests.push((Method::Get, url.to_string()));
            state.blobs.get(url).cloned()
        };
        match blob {
            Some(bytes) => fs::write(dest, bytes)?,
            None => match url.strip_prefix("file://") {
                Some(source) => {
                    fs::copy(source, dest)?;
                }
                None => {
                    return Err(RegistryError::DownloadFailed {
                        url: url.to_string(),
                        path: dest.to_path_buf(),
                        reason: "404 not found".into(),
                    })
                }
            },
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        let entities: usize = state.tables.values().map(Vec::len).sum();
        f.debug_struct("InMemoryRegistry")
            .field("root", &self.root)
            .field("entity_count", &entities)
            .finish()
    }
}

fn not_found() -> (u16, Value) {
    (404, json!({"detail": "Not found."}))
}

fn row_id(row: &Map<String, Value>) -> u64 {
    row.get("id").and_then(Value::as_u64).unwrap_or_default()
}

fn find_row(state: &State, table: Table, id: u64) -> Option<&Map<String, Value>> {
    state.tables.get(&table)?.iter().find(|row| row_id(row) == id)
}

fn parse_query(query: &str) -> Option<BTreeMap<String, Vec<String>>> {
    let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).ok()?.into_owned();
        let value = urlencoding::decode(value).ok()?.into_owned();
        filters.entry(key).or_default().push(value);
    }
    Some(filters)
}

fn row_matches(row: &Map<String, Value>, filters: &BTreeMap<String, Vec<String>>) -> bool {
    filters.iter().all(|(key, wanted)| match row.get(key) {
        Some(stored) => wanted.iter().all(|w| field_matches(stored, w)),
        None => false,
    })
}

/// Does a stored field satisfy one query value?
fn field_matches(stored: &Value, wanted: &str) -> bool {
    match stored {
        Value::String(s) => {
            s == wanted
                || RegistryObjectRef::parse(s).is_ok_and(|r| r.id().to_string() == wanted)
        }
        Value::Bool(b) => b.to_string() == wanted.to_ascii_lowercase(),
        Value::Number(n) => n.to_string() == wanted,
        Value::Array(items) => items.iter().any(|item| field_matches(item, wanted)),
        Value::Null | Value::Object(_) => false,
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        if let (Ok(rx), Ok(ry)) = (RegistryObjectRef::parse(x), RegistryObjectRef::parse(y)) {
            return rx == ry;
        }
    }
    a == b
}

fn conflicts(state: &State, table: Table, fields: &Map<String, Value>) -> bool {
    let unique = unique_fields(table);
    if unique.is_empty() {
        return false;
    }
    state.tables.get(&table).into_iter().flatten().any(|row| {
        unique.iter().all(|key| match (row.get(*key), fields.get(*key)) {
            (Some(a), Some(b)) => same_value(a, b),
            (None, None) => true,
            _ => false,
        })
    })
}
