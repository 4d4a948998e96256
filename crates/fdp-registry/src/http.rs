use std::io;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::transport::{RegistryRequest, RegistryResponse, RegistryTransport};

/// Blocking HTTP transport backed by a `ureq` agent.
///
/// Every request is bounded by [`ClientConfig::timeout`], so a hung registry
/// fails the call instead of blocking the run forever.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl RegistryTransport for HttpTransport {
    fn send(&self, request: &RegistryRequest) -> RegistryResult<RegistryResponse> {
        let mut req = self
            .agent
            .request(request.method.as_str(), &request.url)
            .set("Accept", "application/json");
        if let Some(token) = request.auth_token() {
            req = req.set("Authorization", &format!("token {token}"));
        }

        let result = match &request.body {
            Some(body) => req
                .set("Content-Type", "application/json")
                .send_string(&body.to_string()),
            None => req.call(),
        };

        let response = match result {
            Ok(response) => response,
            // Non-2xx statuses still carry a response the client inspects.
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(RegistryError::Unreachable {
                    url: request.url.clone(),
                    reason: transport.to_string(),
                })
            }
        };

        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| RegistryError::MalformedResponse {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;
        debug!(method = %request.method, url = %request.url, status, "registry call");
        Ok(RegistryResponse { status, body })
    }

    fn download(&self, url: &str, dest: &Path) -> RegistryResult<()> {
        let failed = |reason: String| RegistryError::DownloadFailed {
            url: url.to_string(),
            path: dest.to_path_buf(),
            reason,
        };

        let response = self.agent.get(url).call().map_err(|e| failed(e.to_string()))?;
        let mut reader = response.into_reader();
        // Stream into a sibling temp file; `dest` only appears once the body is complete.
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(|e| failed(e.to_string()))?;
        let bytes = io::copy(&mut reader, &mut file).map_err(|e| failed(e.to_string()))?;
        file.persist(dest).map_err(|e| failed(e.error.to_string()))?;
        debug!(url, dest = %dest.display(), bytes, "downloaded");
        Ok(())
    }
}
