//! Strict-mode validation: detect unknown keys in config files.
//!
//! Settings belong in the `[config]` table and every key there must name a
//! registered setting. Other tables and arrays of tables are free-form
//! sections for the application, but bare keys outside any table have
//! nowhere to go and are reported too.

use std::path::Path;

use toml::Table;

use crate::error::ConfigError;
use crate::merge::is_section;
use crate::settings::Settings;

pub const CONFIG_TABLE: &str = "config";

/// Check a parsed config file against the registry.
///
/// Each unknown key is reported with its file path and best-effort line
/// number.
pub fn validate_unknown_keys(
    table: &Table,
    content: &str,
    path: &Path,
    settings: &Settings,
) -> Result<(), ConfigError> {
    let mut unknown: Vec<String> = Vec::new();

    for (key, value) in table {
        if key == CONFIG_TABLE {
            if let Some(config) = value.as_table() {
                unknown.extend(
                    config
                        .keys()
                        .filter(|name| !settings.contains(name))
                        .map(|name| format!("{CONFIG_TABLE}.{name}")),
                );
            }
        } else if !is_section(value) {
            unknown.push(key.clone());
        }
    }

    if unknown.is_empty() {
        return Ok(());
    }

    let errors = unknown
        .into_iter()
        .map(|dotted| {
            let line = find_key_line(content, &dotted);
            let key = dotted
                .strip_prefix(&format!("{CONFIG_TABLE}."))
                .map(str::to_string)
                .unwrap_or(dotted);
            ConfigError::UnknownKey {
                key,
                path: path.to_path_buf(),
                line,
            }
        })
        .collect();

    Err(ConfigError::UnknownKeys(errors))
}

/// Find the 1-indexed line number for a key in TOML content.
///
/// For a dotted key like `"config.typo"`, tracks the current `[section]`
/// header while scanning and only matches the leaf key inside that section.
/// Handles plain and quoted bare keys; does not handle inline tables.
/// Returns 0 if the key cannot be located.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let (section, leaf) = match dotted_key.rsplit_once('.') {
        Some((section, leaf)) => (section, leaf),
        None => ("", dotted_key),
    };

    let mut current_section = String::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if let Some(header) = trimmed.strip_prefix('[') {
            current_section = header
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split('.')
                .map(|s| s.trim().trim_matches('"'))
                .collect::<Vec<_>>()
                .join(".");
            continue;
        }

        if current_section != section {
            continue;
        }

        if let Some((key, _)) = trimmed.split_once('=')
            && key.trim().trim_matches('"') == leaf
        {
            return i + 1;
        }
    }

    0
}
