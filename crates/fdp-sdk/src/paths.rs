//! Path arithmetic shared by link and finalise.
//!
//! Storage locations are stored in the registry relative to their storage
//! root with forward slashes and no leading slash.

use std::path::{Path, PathBuf};

const LOCAL_SCHEMES: [&str; 2] = ["file://", "local://"];

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// A storage root as a filesystem prefix: `file://` and `local://` removed.
pub fn strip_root_scheme(root: &str) -> &str {
    LOCAL_SCHEMES
        .iter()
        .find_map(|scheme| root.strip_prefix(scheme))
        .unwrap_or(root)
}

/// Whether a storage root must be fetched over HTTP.
pub fn is_remote_root(root: &str) -> bool {
    root.starts_with("http://") || root.starts_with("https://")
}

/// Registry form of `path` relative to `store`: prefix removed, separators
/// normalised to `/`, no leading slash.
pub fn storage_relative_path(path: &Path, store: &Path) -> String {
    let relative = path.strip_prefix(store).unwrap_or(path);
    relative
        .to_string_lossy()
        .replace('\\', "/")
        .trim_start_matches('/')
        .to_string()
}

/// Join a storage root and a storage location path.
pub fn resolve_location(root: &str, location: &str) -> String {
    let root = strip_root_scheme(root).trim_end_matches('/');
    let location = location.trim_start_matches('/');
    format!("{root}/{location}")
}

/// A storage location path as a relative path safe to join under the data
/// store. Root, `.` and `..` components are dropped; `None` if nothing is left.
pub(crate) fn mirror_path(location: &str) -> Option<PathBuf> {
    let relative: PathBuf = location
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect();
    relative.components().next().is_some().then_some(relative)
}

/// `remote_repo` relative to the code repository root.
pub(crate) fn repo_relative_path(remote_repo: &str, repo_root: &str) -> String {
    remote_repo
        .strip_prefix(repo_root)
        .unwrap_or(remote_repo)
        .trim_start_matches('/')
        .to_string()
}
