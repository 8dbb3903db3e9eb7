//! File archival: writing downloaded bodies to local storage.
//!
//! The default archive callback derives a file name from the last non-empty
//! URL path segment, falling back to `download_<hash><ext>` with the
//! extension inferred from the request's expected type. The storage
//! directory is created if missing. Files are not deduplicated on disk;
//! concurrent writes to the same name are the caller's responsibility.

use crate::error::Error;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// Extensions inferred from an archive request's expected type.
fn extension_for(expected_type: Option<&str>) -> &'static str {
    match expected_type {
        Some("pdf") => ".pdf",
        Some("audio") => ".mp3",
        _ => "",
    }
}

/// Derive the on-disk file name for an archived URL.
#[must_use]
pub fn filename_for(url: &str, expected_type: Option<&str>) -> String {
    let segment = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|segments| {
                segments
                    .filter(|s| !s.is_empty() && *s != ".")
                    .next_back()
                    .map(str::to_string)
            })
            .filter(|s| !s.is_empty())
    });

    segment.unwrap_or_else(|| {
        let digest = Sha256::digest(url.as_bytes());
        let hash = format!("{digest:x}");
        format!("download_{}{}", &hash[..16], extension_for(expected_type))
    })
}

/// Default archive callback: write the body under `storage_dir` and return
/// the local path.
///
/// # Errors
///
/// Returns an error when the storage directory cannot be created or the file
/// cannot be written.
pub fn default_archive(
    content: &[u8],
    url: &str,
    expected_type: Option<&str>,
    storage_dir: &Path,
) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(storage_dir)?;
    let path = storage_dir.join(filename_for(url, expected_type));
    std::fs::write(&path, content)?;
    Ok(path)
}
