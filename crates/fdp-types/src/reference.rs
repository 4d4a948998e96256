use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Reference to an entity stored in the registry.
///
/// The registry hands out entity URLs of the form `<root><table>/<id>/`.
/// The integer id is always the last path segment; parsing tolerates a
/// missing trailing slash. Two references are equal iff their table and id
/// match, regardless of the root they were fetched from.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistryObjectRef {
    uri: String,
    table: String,
    id: u64,
}

impl RegistryObjectRef {
    /// Parse a registry entity URL.
    pub fn parse(uri: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidReference {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = uri.trim_end_matches('/');
        let mut segments = trimmed.rsplit('/');
        let id = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing id segment"))?
            .parse::<u64>()
            .map_err(|_| invalid("last path segment is not an integer id"))?;
        let table = segments
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .ok_or_else(|| invalid("missing table segment"))?;

        Ok(Self {
            uri: format!("{trimmed}/"),
            table: table.to_string(),
            id,
        })
    }

    /// Build a reference from an API root, table name and id.
    pub fn from_parts(root: &str, table: &str, id: u64) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            uri: format!("{root}/{table}/{id}/"),
            table: table.to_string(),
            id,
        }
    }

    /// The integer id of the entity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registry table the entity lives in.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Full entity URL, always with a trailing slash.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// `<table>/<id>/`, the path relative to the API root.
    pub fn path(&self) -> String {
        format!("{}/{}/", self.table, self.id)
    }
}

impl PartialEq for RegistryObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.table == other.table
    }
}

impl Eq for RegistryObjectRef {}

impl Hash for RegistryObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for RegistryObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistryObjectRef({}/{})", self.table, self.id)
    }
}

impl fmt::Display for RegistryObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl TryFrom<String> for RegistryObjectRef {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RegistryObjectRef> for String {
    fn from(r: RegistryObjectRef) -> Self {
        r.uri
    }
}
