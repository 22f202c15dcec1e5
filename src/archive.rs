//! Unpacking downloaded zip files next to the archive.

use crate::error::{Error, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// Superseded extractions are moved here, inside the category directory.
pub const OLD_ZIPS_DIR: &str = "Old_zips";

/// Extract `zip_path` into a directory named after the archive. A previous
/// extraction is moved to `Old_zips/<base>_archived_<timestamp>` first.
pub fn extract(zip_path: &Path) -> Result<PathBuf> {
    let parent = zip_path.parent().unwrap_or_else(|| Path::new("."));
    let base = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = parent.join(&base);

    if target.is_dir() {
        let archived = archive_previous(parent, &base, &target)?;
        info!(from = %target.display(), to = %archived.display(), "Archived previous extraction");
    }

    fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
    unpack(zip_path, &target).map_err(|source| Error::Archive {
        path: zip_path.to_path_buf(),
        source,
    })?;

    Ok(target)
}

fn archive_previous(parent: &Path, base: &str, target: &Path) -> Result<PathBuf> {
    let old_dir = parent.join(OLD_ZIPS_DIR);
    fs::create_dir_all(&old_dir).map_err(|e| Error::io(&old_dir, e))?;

    // ISO 8601 basic format, safe in file names
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let archived = old_dir.join(format!("{base}_archived_{stamp}"));
    fs::rename(target, &archived).map_err(|e| Error::io(target, e))?;

    Ok(archived)
}

fn unpack(zip_path: &Path, target: &Path) -> zip::result::ZipResult<()> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            debug!(name = entry.name(), "Skipping entry outside extraction directory");
            continue;
        };
        let out_path = target.join(relative);

        if entry.name().ends_with('/') {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(dir) = out_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }

    Ok(())
}
