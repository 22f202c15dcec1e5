//! Destination file names.
//!
//! Servers are inconsistent about what the last path segment looks like, so
//! the rules below are applied in a fixed order.

use crate::models::RemoteArtifact;

/// SuperAntiSpyware serves a new random filename on every request.
pub const RANDOM_NAME_PREFIX: &str = "SuperAntiSpyware_Portable";

pub const DEFAULT_FILE_TYPE: &str = ".exe";

/// Name a downloaded file from the URL it was served at.
pub fn derive_name(remote: &RemoteArtifact, name_prefix: &str, file_type: Option<&str>) -> String {
    let file_type = file_type.unwrap_or(DEFAULT_FILE_TYPE);

    let name = if name_prefix == RANDOM_NAME_PREFIX {
        format!("{name_prefix}{file_type}")
    } else {
        let segment = last_segment(strip_query(&remote.path), file_type);
        if segment.is_empty() {
            name_prefix.to_string()
        } else if name_prefix.is_empty() {
            segment
        } else {
            format!("{name_prefix}_{segment}")
        }
    };

    name.replace("%20", "_")
}

fn strip_query(path: &str) -> &str {
    match path.find('?') {
        Some(idx) if idx > 0 => &path[..idx],
        _ => path,
    }
}

fn last_segment(path: &str, file_type: &str) -> String {
    match path.strip_suffix('/') {
        // "/file/mbam_current/" names the directory, not a file
        Some(dir) => {
            let segment = dir.rsplit('/').next().unwrap_or_default();
            format!("{segment}{file_type}")
        }
        None => path.rsplit('/').next().unwrap_or_default().to_string(),
    }
}
