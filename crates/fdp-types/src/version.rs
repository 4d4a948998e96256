//! Data product version validation.
//!
//! Versions are treated as opaque strings everywhere else; this module only
//! rejects strings that are not `MAJOR.MINOR.PATCH` with an optional
//! `-prerelease` and `+build` suffix.

use crate::error::TypeError;

/// Version applied when a read or write entry leaves `use.version` unset.
pub const DEFAULT_VERSION: &str = "0.0.1";

/// Validate a semantic version string.
///
/// ```
/// use fdp_types::validate_version;
///
/// assert!(validate_version("0.0.1").is_ok());
/// assert!(validate_version("1.2.3-alpha.1+build.5").is_ok());
/// assert!(validate_version("1.2").is_err());
/// assert!(validate_version("01.2.3").is_err());
/// ```
pub fn validate_version(version: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidVersion {
        version: version.to_string(),
        reason,
    };

    let (rest, build) = match version.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (version, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() != 3 {
        return Err(invalid(format!(
            "expected MAJOR.MINOR.PATCH, found {} component(s)",
            parts.len()
        )));
    }
    for part in &parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(format!("{part:?} is not a number")));
        }
        if part.len() > 1 && part.starts_with('0') {
            return Err(invalid(format!("{part:?} has a leading zero")));
        }
    }

    for (label, suffix) in [("pre-release", pre), ("build", build)] {
        let Some(suffix) = suffix else { continue };
        let ok = suffix.split('.').all(|ident| {
            !ident.is_empty() && ident.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
        if !ok {
            return Err(invalid(format!("malformed {label} identifier {suffix:?}")));
        }
    }

    Ok(())
}
