use std::{
    fs,
    path::{Path, PathBuf},
};

use miette::{Context, IntoDiagnostic};
use tracing::{debug, warn};

use crate::result::Result;

/// Working path of a download, next to its final destination.
///
/// Format: `<stem>_<unix_secs>.<ext>`, or `<stem>_<unix_secs>` without extension.
pub fn timestamped_path(output: &Path, unix_secs: i64) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match output.extension() {
        Some(ext) => format!("{stem}_{unix_secs}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{unix_secs}"),
    };
    output.with_file_name(file_name)
}

/// Create the parent directories of `path`
pub fn create_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not create directory {}", parent.display()))?),
        _ => Ok(()),
    }
}

/// Size of the file, `None` when it does not exist or is not a file
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

/// Remove a partial or invalid file, if any
pub fn remove_if_exists(path: &Path) {
    if !path.exists() {
        return;
    }

    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(err) => warn!("Could not remove {}: {err}", path.display()),
    }
}

/// Remove `path` and the files yt-dlp derives from it.
///
/// Those share the file stem of `path`: `.part` and `.ytdl` files, per-stream
/// `.f<id>.<ext>` files before a merge, or an output whose extension changed.
/// The stem of a working path carries a timestamp, so no other file matches.
pub fn remove_partial_files(path: &Path) {
    remove_if_exists(path);

    let (Some(file_name), Some(stem)) = (path.file_name(), path.file_stem()) else {
        return;
    };
    let file_name = file_name.to_string_lossy();
    let prefix = format!("{}.", stem.to_string_lossy());

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Could not list {}: {err}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&*file_name) || name.starts_with(&prefix) {
            remove_if_exists(&entry.path());
        }
    }
}

/// Move a file, falling back to a copy when a rename is not possible
/// (e.g. across file systems)
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    debug!("Moving file failed, falling back to copying");
    fs::copy(from, to)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not move {} to {}", from.display(), to.display()))?;
    fs::remove_file(from)?;
    Ok(())
}
