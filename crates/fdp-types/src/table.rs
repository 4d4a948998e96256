use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

/// Registry tables consumed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Users,
    UserAuthor,
    Author,
    StorageRoot,
    StorageLocation,
    FileType,
    Object,
    ObjectComponent,
    Namespace,
    DataProduct,
    CodeRun,
}

impl Table {
    pub const ALL: [Table; 11] = [
        Self::Users,
        Self::UserAuthor,
        Self::Author,
        Self::StorageRoot,
        Self::StorageLocation,
        Self::FileType,
        Self::Object,
        Self::ObjectComponent,
        Self::Namespace,
        Self::DataProduct,
        Self::CodeRun,
    ];

    /// Endpoint name as used in registry URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::UserAuthor => "user_author",
            Self::Author => "author",
            Self::StorageRoot => "storage_root",
            Self::StorageLocation => "storage_location",
            Self::FileType => "file_type",
            Self::Object => "object",
            Self::ObjectComponent => "object_component",
            Self::Namespace => "namespace",
            Self::DataProduct => "data_product",
            Self::CodeRun => "code_run",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownTable(s.to_string()))
    }
}
