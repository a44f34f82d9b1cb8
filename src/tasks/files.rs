use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Expand the command-line arguments into an ordered quilt list.
///
/// Files are kept as given (if they look like images); directories are
/// walked recursively with entries sorted by file name. Argument order is
/// preserved and duplicates are dropped.
pub fn discover_quilts(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::<PathBuf>::new();
    for root in paths {
        if !root.exists() {
            bail!("{} does not exist", root.display());
        }
        if root.is_file() {
            if is_quilt_image(root) {
                push_unique(&mut found, root.clone());
            } else {
                warn!(path = %root.display(), "not a png/jpeg file; skipping");
            }
            continue;
        }
        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "walk error; skipping entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if is_quilt_image(path) {
                debug!(path = %path.display(), "discovered quilt");
                push_unique(&mut found, path.to_path_buf());
            }
        }
    }
    info!(discovered = found.len(), "quilt discovery complete");
    Ok(found)
}

fn push_unique(found: &mut Vec<PathBuf>, path: PathBuf) {
    if !found.contains(&path) {
        found.push(path);
    }
}

#[inline]
pub fn is_quilt_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png"].contains(&e.as_str())
    )
}
