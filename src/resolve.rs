//! Settings loading pipeline: apply every layer to the registry.
//!
//! Operates on pre-loaded data (`LoadInput`) with no I/O, so the whole
//! pipeline is testable with synthetic inputs. Defaults are already in the
//! registry when the settings are defined; the steps here are:
//!
//! 1. Parse each config file, validate it (if strict), apply its `[config]`
//!    table and keep its other tables as sections
//! 2. Apply `{PREFIX}__NAME` environment variables
//! 3. Apply command-line values (highest priority)

use std::path::{Path, PathBuf};

use toml::Table;

use crate::env;
use crate::error::ConfigError;
use crate::merge::is_section;
use crate::settings::Settings;
use crate::types::{RawValue, Source};
use crate::validate::{self, CONFIG_TABLE};

/// All pre-loaded data needed to fill the registry. No I/O happens here.
#[derive(Debug, Clone, Default)]
pub struct LoadInput {
    /// File contents in precedence order: first = lowest priority, last = highest.
    pub files: Vec<(PathBuf, String)>,
    /// Raw environment variable pairs (pass `std::env::vars().collect()` or synthetic data).
    pub env_vars: Vec<(String, String)>,
    /// Env var prefix (e.g. `"GREPPER"`). `None` means env disabled.
    pub env_prefix: Option<String>,
    /// Values given on the command line, by setting name.
    pub cli_values: Vec<(String, RawValue)>,
    /// Whether to reject unknown keys in config files.
    pub strict: bool,
}

/// Apply all layers in `input` to `settings`.
pub fn load(settings: &mut Settings, input: LoadInput) -> Result<(), ConfigError> {
    for (path, content) in &input.files {
        apply_file(settings, path, content, input.strict)?;
    }

    if let Some(prefix) = &input.env_prefix {
        for (name, raw) in env::env_to_pairs(prefix, input.env_vars) {
            if settings.contains(&name) {
                settings.set_from_source(&name, &raw, Source::Environment)?;
            }
        }
    }

    for (name, raw) in input.cli_values {
        settings.set_raw(&name, raw, Source::CommandLine)?;
    }

    Ok(())
}

fn apply_file(
    settings: &mut Settings,
    path: &Path,
    content: &str,
    strict: bool,
) -> Result<(), ConfigError> {
    let mut table: Table = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    if strict {
        validate::validate_unknown_keys(&table, content, path, settings)?;
    }

    if let Some(config) = table.remove(CONFIG_TABLE) {
        let toml::Value::Table(config) = config else {
            return Err(ConfigError::Malformed {
                path: path.to_path_buf(),
                reason: format!("'{CONFIG_TABLE}' must be a table"),
            });
        };
        for (name, value) in &config {
            if !settings.contains(name) {
                tracing::debug!(path = %path.display(), key = %name, "ignoring unknown setting");
                continue;
            }
            settings.set_from_toml(name, value, Source::ConfigFile)?;
        }
    }

    table.retain(|_, value| is_section(value));
    settings.merge_sections(table);
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(())
}
