//! Environment variables as a settings layer.

/// Collect `(setting_name, raw_value)` pairs from variables named
/// `{PREFIX}__{NAME}`.
///
/// `NAME` is lowercased and single underscores become dashes, so
/// `GREPPER__LOG_LEVEL` targets the `log-level` setting. Names that match no
/// setting are left for the caller to ignore.
///
/// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
pub fn env_to_pairs(
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Vec<(String, String)> {
    let needle = format!("{prefix}__");
    let mut pairs: Vec<(String, String)> = vars
        .into_iter()
        .filter_map(|(key, value)| {
            let rest = key.strip_prefix(&needle)?;
            if rest.is_empty() {
                return None;
            }
            Some((rest.to_lowercase().replace('_', "-"), value))
        })
        .collect();
    // std::env::vars() order is unspecified; keep the result stable.
    pairs.sort();
    pairs
}

/// Derive an environment-variable-safe name from a program name.
///
/// Uses the basename up to the first `.`, uppercased, with every character
/// that is not an ASCII letter or digit replaced by `_`: `my-tool.py` becomes
/// `MY_TOOL`.
pub fn env_name(progname: &str) -> String {
    let basename = progname.rsplit(['/', '\\']).next().unwrap_or(progname);
    let stem = basename.split('.').next().unwrap_or(basename);
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
