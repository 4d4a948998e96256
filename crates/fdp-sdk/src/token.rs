use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// `~/.fair/registry/token`, where the registry's init step leaves the token.
pub fn default_token_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".fair").join("registry").join("token"))
}

/// Read a registry token file. The first whitespace-delimited word is the
/// token.
pub fn read_token(path: &Path) -> SdkResult<String> {
    let text = fs::read_to_string(path).map_err(|e| {
        SdkError::ConfigParsing(format!("cannot read token file {}: {e}", path.display()))
    })?;
    let token = text.split_whitespace().next().ok_or_else(|| {
        SdkError::ConfigParsing(format!("token file {} is empty", path.display()))
    })?;
    debug!(path = %path.display(), "loaded registry token");
    Ok(token.to_string())
}
