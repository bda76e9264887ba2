use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A discovered subtitle file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the corpus root.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
}

/// Subtitle extension, matched case-insensitively.
const SUBTITLE_EXTENSION: &str = "srt";

/// Recursively walk a corpus root and discover subtitle files.
///
/// Skips hidden files/directories (names starting with `.`). Results are
/// sorted by relative path, which fixes the order documents are numbered
/// in.
pub fn discover_files(root: &Path) -> Result<Vec<DiscoveredFile>> {
    if !root.is_dir() {
        return Err(Error::PathNotFound(root.to_path_buf()));
    }
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), results)?;
        } else if file_type.is_symlink() {
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        "skipping broken symlink"
                    );
                    continue;
                }
            };
            // Directory symlinks are not followed (cycle prevention).
            if resolved.is_file() && is_subtitle(&resolved) {
                results.push(make_discovered(root, &entry.path(), resolved));
            }
        } else if file_type.is_file() && is_subtitle(&entry.path()) {
            let abs = entry.path().canonicalize()?;
            results.push(make_discovered(root, &entry.path(), abs));
        }
    }

    Ok(())
}

fn is_subtitle(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SUBTITLE_EXTENSION))
}

fn make_discovered(
    root: &Path,
    original_path: &Path,
    absolute_path: PathBuf,
) -> DiscoveredFile {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    DiscoveredFile {
        relative_path,
        absolute_path,
    }
}
