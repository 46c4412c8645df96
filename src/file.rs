//! Config file discovery and loading.
//!
//! The default file list depends only on the program name:
//!
//! 1. `/etc/{prog}.toml`
//! 2. every `*.toml` in `/etc/{prog}/`, sorted by name
//! 3. `~/.{prog}.toml`
//! 4. every `*.toml` in the platform config directory (XDG on Linux,
//!    `~/Library/Application Support` on macOS), sorted by name
//!
//! Files are listed in **priority-ascending** order: later files override
//! earlier ones. Missing default files are silently skipped. Files named with
//! `--config` are required, and a missing one is an error.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_EXTENSION: &str = "toml";

/// The default config file list for `progname`. The files may or may not exist.
pub fn default_config_files(progname: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let etc = PathBuf::from("/etc");
    files.push(etc.join(format!("{progname}.{CONFIG_EXTENSION}")));
    files.extend(list_config_dir(&etc.join(progname)));

    if let Some(user) = directories::UserDirs::new() {
        files.push(
            user.home_dir()
                .join(format!(".{progname}.{CONFIG_EXTENSION}")),
        );
    }

    if let Some(proj) = directories::ProjectDirs::from("", "", progname) {
        for file in list_config_dir(proj.config_dir()) {
            if !files.contains(&file) {
                files.push(file);
            }
        }
    }

    files
}

/// Config files in `dir`, sorted by name. Empty if `dir` is not a directory.
pub fn list_config_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == CONFIG_EXTENSION)
        })
        .collect();
    files.sort();
    files
}

/// Read every file in `paths`, in order.
///
/// A missing file is skipped unless it also appears in `required`. Other
/// I/O errors are always propagated.
pub fn load_config_files(
    paths: &[PathBuf],
    required: &[PathBuf],
) -> Result<Vec<(PathBuf, String)>, ConfigError> {
    let mut results = Vec::new();
    for path in paths {
        match std::fs::read_to_string(path) {
            Ok(content) => results.push((path.clone(), content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required.contains(path) => {
                tracing::debug!(path = %path.display(), "config file not found, skipping");
            }
            Err(e) => {
                return Err(ConfigError::IoError {
                    path: path.clone(),
                    source: e,
                });
            }
        }
    }
    Ok(results)
}
