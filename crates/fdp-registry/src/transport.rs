use std::fmt;
use std::path::Path;

use serde_json::Value;

use crate::error::RegistryResult;

/// HTTP verbs the client issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the registry.
#[derive(Clone, Debug)]
pub struct RegistryRequest {
    pub method: Method,
    pub url: String,
    /// JSON body for POST/PATCH.
    pub body: Option<Value>,
    /// Sent as `Authorization: token <token>` when non-empty.
    pub token: Option<String>,
}

impl RegistryRequest {
    pub fn get(url: impl Into<String>, token: Option<&str>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
            token: token.map(str::to_string),
        }
    }

    pub fn post(url: impl Into<String>, body: Value, token: Option<&str>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
            token: token.map(str::to_string),
        }
    }

    pub fn patch(url: impl Into<String>, body: Value, token: Option<&str>) -> Self {
        Self {
            method: Method::Patch,
            url: url.into(),
            body: Some(body),
            token: token.map(str::to_string),
        }
    }

    /// The token to send, if any.
    pub fn auth_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Raw status and body of a registry response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryResponse {
    pub status: u16,
    pub body: String,
}

/// Moves requests to a registry and files out of it.
///
/// Implementations report any HTTP status as a response; only a missing
/// response is an error. Status interpretation belongs to
/// [`RegistryClient`](crate::RegistryClient).
pub trait RegistryTransport: Send + Sync {
    fn send(&self, request: &RegistryRequest) -> RegistryResult<RegistryResponse>;

    /// Stream `url` into a new file at `dest`.
    fn download(&self, url: &str, dest: &Path) -> RegistryResult<()>;
}
