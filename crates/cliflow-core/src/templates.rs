//! Filesystem suggestions for the `filepaths` and `folders` templates.

use crate::tokenize::unescape;
use crate::types::{Suggestion, SuggestionKind};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Priority of directory suggestions.
pub const FOLDER_PRIORITY: i32 = 90;
/// Priority of file suggestions.
pub const FILE_PRIORITY: i32 = 85;

/// Entries of the directory a partial path points into.
#[derive(Debug, Clone, Default)]
pub struct PathListing {
    /// One suggestion per entry, sorted by name
    pub suggestions: Vec<Suggestion>,
    /// The fragment after the last `/`, to rank entries against
    pub fragment: String,
}

/// List candidates for `partial` (as typed, possibly with backslash escapes)
/// relative to `cwd`.
///
/// `partial` ending in `/` (or empty) lists that directory; otherwise the
/// parent directory is listed and the last component becomes the fragment.
/// Dotfiles are skipped unless the fragment starts with `.`. Directory names
/// carry a trailing `/`, and `insertValue` keeps whatever path prefix was
/// typed so the shell can replace the whole token.
#[must_use]
pub fn list_paths(partial: &str, cwd: &Path, files: bool, folders: bool) -> PathListing {
    let typed = unescape(partial);
    let (prefix, fragment) = match typed.rfind('/') {
        Some(idx) => (&typed[..=idx], &typed[idx + 1..]),
        None => ("", typed.as_str()),
    };

    let dir = resolve_dir(prefix, cwd);
    let Ok(read_dir) = std::fs::read_dir(&dir) else {
        debug!(dir = %dir.display(), "path template: directory not readable");
        return PathListing {
            suggestions: Vec::new(),
            fragment: fragment.to_string(),
        };
    };

    let show_hidden = fragment.starts_with('.');
    let mut entries: Vec<(String, bool)> = read_dir
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && !show_hidden {
                return None;
            }
            // Follows symlinks so a link to a directory is navigable.
            let is_dir = std::fs::metadata(entry.path()).ok()?.is_dir();
            Some((name, is_dir))
        })
        .filter(|(_, is_dir)| if *is_dir { folders } else { files })
        .collect();
    entries.sort();

    let suggestions = entries
        .into_iter()
        .map(|(name, is_dir)| {
            if is_dir {
                let display = format!("{name}/");
                Suggestion::new(display.clone(), SuggestionKind::Folder)
                    .with_description("Directory")
                    .with_priority(FOLDER_PRIORITY)
                    .with_insert_value(format!("{prefix}{display}"))
            } else {
                Suggestion::new(name.clone(), SuggestionKind::File)
                    .with_description("File")
                    .with_priority(FILE_PRIORITY)
                    .with_insert_value(format!("{prefix}{name}"))
            }
        })
        .collect();

    PathListing {
        suggestions,
        fragment: fragment.to_string(),
    }
}

fn resolve_dir(prefix: &str, cwd: &Path) -> PathBuf {
    if prefix.is_empty() {
        return cwd.to_path_buf();
    }
    let expanded = crate::config::expand_tilde(Path::new(prefix));
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}
