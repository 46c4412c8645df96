//! The settings registry.
//!
//! A [`Setting`] is a typed value known by one or more aliases. Every setting
//! remembers which [`Source`] its current value came from; a new value is
//! accepted only when its source has equal or higher precedence, which gives
//! the usual layering of defaults, config files, environment and command line
//! without depending on the order the layers are applied in.
//!
//! Config files may carry tables other than `[config]`. Those are kept
//! verbatim as *sections* for the application to interpret.

use std::collections::HashMap;

use toml::Table;

use crate::error::ConfigError;
use crate::merge;
use crate::types::{Kind, RawValue, Source, Value};
use crate::value;

/// Names taken by framework options; settings may not use them.
pub const RESERVED_NAMES: &[&str] = &[
    "help",
    "h",
    "version",
    "V",
    "help-all",
    "config",
    "no-default-configs",
    "dump-config",
    "dump-setting-names",
    "list-config-files",
    "generate-manpage",
    "args",
];

pub const LOG_GROUP: &str = "Logging";
pub const PERF_GROUP: &str = "Performance";

/// One registered setting.
#[derive(Debug, Clone)]
pub struct Setting {
    names: Vec<String>,
    kind: Kind,
    default: Value,
    value: Value,
    source: Source,
    help: String,
    metavar: Option<String>,
    group: Option<String>,
    hidden: bool,
}

impl Setting {
    /// The canonical (first) name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Placeholder shown in help for the option argument.
    pub fn metavar(&self) -> String {
        if let Some(m) = &self.metavar {
            return m.clone();
        }
        match self.kind {
            Kind::ByteSize => "SIZE".to_string(),
            _ => self.name().to_uppercase().replace('-', "_"),
        }
    }

    pub fn set_metavar(&mut self, metavar: &str) -> &mut Self {
        self.metavar = Some(metavar.to_string());
        self
    }

    pub fn set_group(&mut self, group: &str) -> &mut Self {
        self.group = Some(group.to_string());
        self
    }

    /// Hidden settings are left out of `--help` but shown by `--help-all`.
    pub fn set_hidden(&mut self, hidden: bool) -> &mut Self {
        self.hidden = hidden;
        self
    }

    fn assign(&mut self, value: Value, source: Source) -> bool {
        if source < self.source {
            return false;
        }
        self.value = value;
        self.source = source;
        true
    }
}

/// Registry of named, typed settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    settings: Vec<Setting>,
    index: HashMap<String, usize>,
    sections: Table,
}

impl Settings {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the framework's own settings: `output`, the
    /// logging group and the memory profiling settings.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        let mut settings = Self::new();
        settings
            .add_string(
                &["output"],
                "write output to FILE, instead of standard output",
                "",
            )?
            .set_metavar("FILE");
        settings
            .add_string(
                &["log"],
                "write log entries to FILE (default is to not write log files at all); \
                 use \"stderr\" to log to the standard error output, \
                 or \"none\" to disable logging",
                "",
            )?
            .set_metavar("FILE")
            .set_group(LOG_GROUP);
        settings
            .add_choice(
                &["log-level"],
                &["info", "debug", "warning", "error", "critical", "fatal"],
                "log at LEVEL, one of debug, info, warning, error, critical, fatal (default: info)",
            )?
            .set_metavar("LEVEL")
            .set_group(LOG_GROUP);
        settings
            .add_bytesize(
                &["log-max"],
                "rotate logs larger than SIZE, zero for never (default: 0)",
                0,
            )?
            .set_group(LOG_GROUP);
        settings
            .add_integer(&["log-keep"], "keep last N logs (default: 10)", 10)?
            .set_metavar("N")
            .set_group(LOG_GROUP);
        settings
            .add_string(
                &["log-mode"],
                "set permissions of new log files to MODE (octal; default 0600)",
                "0600",
            )?
            .set_metavar("MODE")
            .set_group(LOG_GROUP);
        settings
            .add_choice(
                &["dump-memory-profile"],
                &["simple", "none"],
                "make memory profiling dumps using METHOD, one of simple or none \
                 (default: simple)",
            )?
            .set_metavar("METHOD")
            .set_group(PERF_GROUP);
        settings
            .add_integer(
                &["memory-dump-interval"],
                "make memory profiling dumps at least SECONDS apart (default: 300)",
                300,
            )?
            .set_metavar("SECONDS")
            .set_group(PERF_GROUP);
        Ok(settings)
    }

    /// Register a setting under every name in `aliases`.
    ///
    /// Fails if any alias is already taken, is reserved for a framework
    /// option, or if `default` does not fit `kind`. Nothing is registered on
    /// failure.
    pub fn define(
        &mut self,
        aliases: &[&str],
        kind: Kind,
        default: Value,
        help: &str,
    ) -> Result<&mut Setting, ConfigError> {
        let Some(canonical) = aliases.first() else {
            return Err(ConfigError::InvalidValue {
                name: "<unnamed>".into(),
                reason: "a setting needs at least one name".into(),
            });
        };
        for alias in aliases {
            if RESERVED_NAMES.contains(alias) {
                return Err(ConfigError::Reserved(alias.to_string()));
            }
            if alias.is_empty() || alias.starts_with('-') {
                return Err(ConfigError::InvalidValue {
                    name: alias.to_string(),
                    reason: "setting names must be non-empty and not start with '-'".into(),
                });
            }
            if self.index.contains_key(*alias) {
                return Err(ConfigError::DuplicateName(alias.to_string()));
            }
        }
        for (i, alias) in aliases.iter().enumerate() {
            if aliases[..i].contains(alias) {
                return Err(ConfigError::DuplicateName(alias.to_string()));
            }
        }

        let default = value::check(&kind, default).map_err(|reason| ConfigError::InvalidValue {
            name: canonical.to_string(),
            reason,
        })?;

        let position = self.settings.len();
        for alias in aliases {
            self.index.insert(alias.to_string(), position);
        }
        self.settings.push(Setting {
            names: aliases.iter().map(|s| s.to_string()).collect(),
            kind,
            value: default.clone(),
            default,
            source: Source::Default,
            help: help.to_string(),
            metavar: None,
            group: None,
            hidden: false,
        });
        Ok(&mut self.settings[position])
    }

    pub fn add_string(
        &mut self,
        aliases: &[&str],
        help: &str,
        default: &str,
    ) -> Result<&mut Setting, ConfigError> {
        self.define(aliases, Kind::String, Value::from(default), help)
    }

    pub fn add_boolean(
        &mut self,
        aliases: &[&str],
        help: &str,
        default: bool,
    ) -> Result<&mut Setting, ConfigError> {
        self.define(aliases, Kind::Boolean, Value::Bool(default), help)
    }

    pub fn add_integer(
        &mut self,
        aliases: &[&str],
        help: &str,
        default: i64,
    ) -> Result<&mut Setting, ConfigError> {
        self.define(aliases, Kind::Integer, Value::Int(default), help)
    }

    /// A setting that may be given several times on the command line,
    /// e.g. `--exclude=foo --exclude=bar`.
    pub fn add_string_list(
        &mut self,
        aliases: &[&str],
        help: &str,
        default: &[&str],
    ) -> Result<&mut Setting, ConfigError> {
        self.define(aliases, Kind::StringList, Value::from(default), help)
    }

    /// A setting restricted to `choices`; the first choice is the default.
    pub fn add_choice(
        &mut self,
        aliases: &[&str],
        choices: &[&str],
        help: &str,
    ) -> Result<&mut Setting, ConfigError> {
        let default = choices.first().copied().unwrap_or_default();
        let kind = Kind::Choice(choices.iter().map(|s| s.to_string()).collect());
        self.define(aliases, kind, Value::from(default), help)
    }

    pub fn add_bytesize(
        &mut self,
        aliases: &[&str],
        help: &str,
        default: i64,
    ) -> Result<&mut Setting, ConfigError> {
        self.define(aliases, Kind::ByteSize, Value::Int(default), help)
    }

    /// Look up a setting by any of its aliases.
    pub fn setting(&self, name: &str) -> Result<&Setting, ConfigError> {
        self.index
            .get(name)
            .map(|&i| &self.settings[i])
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))
    }

    fn setting_mut(&mut self, name: &str) -> Result<&mut Setting, ConfigError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.settings[i]),
            None => Err(ConfigError::UnknownSetting(name.to_string())),
        }
    }

    /// Current value of a setting.
    pub fn get(&self, name: &str) -> Result<&Value, ConfigError> {
        self.setting(name).map(Setting::value)
    }

    /// Which tier the current value came from.
    pub fn source_of(&self, name: &str) -> Result<Source, ConfigError> {
        self.setting(name).map(Setting::source)
    }

    /// Coerce `raw` and store it, unless the current value came from a
    /// higher-precedence source. Returns whether the value was stored.
    pub fn set_from_source(
        &mut self,
        name: &str,
        raw: &str,
        source: Source,
    ) -> Result<bool, ConfigError> {
        let setting = self.setting_mut(name)?;
        let value = value::coerce(&setting.kind, raw).map_err(|reason| {
            ConfigError::InvalidValue {
                name: name.to_string(),
                reason,
            }
        })?;
        Ok(setting.assign(value, source))
    }

    /// Like [`set_from_source`](Self::set_from_source) for a value that is
    /// already typed. The value still has to fit the setting's kind.
    pub fn set_value(
        &mut self,
        name: &str,
        value: Value,
        source: Source,
    ) -> Result<bool, ConfigError> {
        let setting = self.setting_mut(name)?;
        let value = value::check(&setting.kind, value).map_err(|reason| {
            ConfigError::InvalidValue {
                name: name.to_string(),
                reason,
            }
        })?;
        Ok(setting.assign(value, source))
    }

    pub fn set_raw(
        &mut self,
        name: &str,
        raw: RawValue,
        source: Source,
    ) -> Result<bool, ConfigError> {
        match raw {
            RawValue::Text(text) => self.set_from_source(name, &text, source),
            RawValue::Typed(value) => self.set_value(name, value, source),
        }
    }

    /// Store a value read from a TOML config file.
    pub fn set_from_toml(
        &mut self,
        name: &str,
        value: &toml::Value,
        source: Source,
    ) -> Result<bool, ConfigError> {
        let setting = self.setting_mut(name)?;
        let value = value::from_toml(&setting.kind, value).map_err(|reason| {
            ConfigError::InvalidValue {
                name: name.to_string(),
                reason,
            }
        })?;
        Ok(setting.assign(value, source))
    }

    pub fn string(&self, name: &str) -> Result<&str, ConfigError> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| wrong_kind(name, "a string"))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, ConfigError> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| wrong_kind(name, "a boolean"))
    }

    pub fn integer(&self, name: &str) -> Result<i64, ConfigError> {
        let value = self.get(name)?;
        value.as_int().ok_or_else(|| wrong_kind(name, "an integer"))
    }

    pub fn string_list(&self, name: &str) -> Result<&[String], ConfigError> {
        let value = self.get(name)?;
        value.as_list().ok_or_else(|| wrong_kind(name, "a list"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Canonical names in registration order.
    pub fn keys(&self) -> Vec<&str> {
        self.settings.iter().map(Setting::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    /// Fail unless every named setting has a value (a default counts).
    pub fn require(&self, names: &[&str]) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        for name in names {
            if !self.get(name)?.is_present() {
                missing.push(name.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRequired(missing))
        }
    }

    /// A non-`[config]` `[name]` table from the config files, if any file
    /// had one. Arrays of tables are read with
    /// [`section_entries`](Self::section_entries).
    pub fn section(&self, name: &str) -> Option<&Table> {
        self.sections.get(name).and_then(toml::Value::as_table)
    }

    /// The entries of a section: every `[[name]]` table in file order, or
    /// the single `[name]` table. Empty if no file had the section.
    pub fn section_entries(&self, name: &str) -> Vec<&Table> {
        match self.sections.get(name) {
            Some(toml::Value::Table(table)) => vec![table],
            Some(toml::Value::Array(items)) => {
                items.iter().filter_map(toml::Value::as_table).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Merge extra config-file sections on top of the ones already held.
    pub fn merge_sections(&mut self, sections: Table) {
        let current = std::mem::take(&mut self.sections);
        self.sections = merge::merge_sections(current, sections);
    }

    /// The effective configuration as a TOML document: a `[config]` table
    /// with every setting, followed by the preserved sections.
    pub fn dump(&self) -> Result<String, ConfigError> {
        let mut config = Table::new();
        for setting in &self.settings {
            config.insert(setting.name().to_string(), setting.value.to_toml());
        }
        let mut doc = Table::new();
        doc.insert("config".into(), toml::Value::Table(config));
        for (name, section) in &self.sections {
            doc.insert(name.clone(), section.clone());
        }
        toml::to_string(&doc).map_err(|e| ConfigError::InvalidValue {
            name: "<dump>".into(),
            reason: e.to_string(),
        })
    }
}

fn wrong_kind(name: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("setting is not {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::sample_settings;

    #[test]
    fn defaults_registered() {
        let settings = Settings::with_defaults().unwrap();
        assert_eq!(settings.string("log").unwrap(), "");
        assert_eq!(settings.string("log-level").unwrap(), "info");
        assert_eq!(settings.integer("log-keep").unwrap(), 10);
        assert_eq!(settings.integer("log-max").unwrap(), 0);
        assert_eq!(settings.string("log-mode").unwrap(), "0600");
        assert_eq!(settings.string("dump-memory-profile").unwrap(), "simple");
        assert_eq!(settings.integer("memory-dump-interval").unwrap(), 300);
        assert_eq!(
            settings.setting("memory-dump-interval").unwrap().group(),
            Some(PERF_GROUP)
        );
    }

    #[test]
    fn lookup_by_any_alias() {
        let settings = sample_settings();
        assert_eq!(settings.string("pattern").unwrap(), "h");
        assert_eq!(settings.string("p").unwrap(), "h");
    }

    #[test]
    fn unknown_name_errors() {
        let settings = sample_settings();
        assert!(matches!(
            settings.get("nope"),
            Err(ConfigError::UnknownSetting(n)) if n == "nope"
        ));
    }

    #[test]
    fn duplicate_alias_rejected_without_partial_registration() {
        let mut settings = sample_settings();
        let err = settings
            .add_string(&["fresh", "p"], "clashes on p", "")
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(n) if n == "p"));
        assert!(!settings.contains("fresh"));
    }

    #[test]
    fn repeated_alias_in_one_definition_rejected() {
        let mut settings = Settings::new();
        let err = settings.add_string(&["x", "x"], "", "").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(_)));
    }

    #[test]
    fn reserved_names_rejected() {
        let mut settings = Settings::new();
        let err = settings.add_boolean(&["help"], "", false).unwrap_err();
        assert!(matches!(err, ConfigError::Reserved(n) if n == "help"));
    }

    #[test]
    fn default_must_fit_kind() {
        let mut settings = Settings::new();
        let err = settings
            .define(&["n"], Kind::Integer, Value::Str("ten".into()), "")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn higher_precedence_overwrites() {
        let mut settings = sample_settings();
        assert!(settings
            .set_from_source("count", "3", Source::ConfigFile)
            .unwrap());
        assert!(settings
            .set_from_source("count", "4", Source::CommandLine)
            .unwrap());
        assert_eq!(settings.integer("count").unwrap(), 4);
        assert_eq!(settings.source_of("count").unwrap(), Source::CommandLine);
    }

    #[test]
    fn lower_precedence_ignored() {
        let mut settings = sample_settings();
        settings
            .set_from_source("count", "4", Source::Environment)
            .unwrap();
        let stored = settings
            .set_from_source("count", "3", Source::ConfigFile)
            .unwrap();
        assert!(!stored);
        assert_eq!(settings.integer("count").unwrap(), 4);
    }

    #[test]
    fn equal_precedence_overwrites() {
        let mut settings = sample_settings();
        settings
            .set_from_source("count", "1", Source::ConfigFile)
            .unwrap();
        settings
            .set_from_source("count", "2", Source::ConfigFile)
            .unwrap();
        assert_eq!(settings.integer("count").unwrap(), 2);
    }

    #[test]
    fn config_value_survives_when_cli_silent() {
        let mut settings = sample_settings();
        settings
            .set_from_source("pattern", "from-file", Source::ConfigFile)
            .unwrap();
        assert_eq!(settings.string("pattern").unwrap(), "from-file");
    }

    #[test]
    fn coercion_failure_is_config_error() {
        let mut settings = sample_settings();
        let err = settings
            .set_from_source("count", "many", Source::CommandLine)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == "count"));
        assert_eq!(settings.integer("count").unwrap(), 0);
    }

    #[test]
    fn set_via_alias_updates_canonical() {
        let mut settings = sample_settings();
        settings
            .set_from_source("p", "xyz", Source::CommandLine)
            .unwrap();
        assert_eq!(settings.string("pattern").unwrap(), "xyz");
    }

    #[test]
    fn typed_accessor_rejects_wrong_kind() {
        let settings = sample_settings();
        assert!(settings.boolean("count").is_err());
    }

    #[test]
    fn require_reports_all_missing() {
        let mut settings = sample_settings();
        settings.add_string(&["a"], "", "").unwrap();
        settings.add_string(&["b"], "", "").unwrap();
        let err = settings.require(&["a", "b", "pattern"]).unwrap_err();
        match err {
            ConfigError::MissingRequired(names) => assert_eq!(names, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn keys_in_registration_order() {
        let settings = sample_settings();
        let keys = settings.keys();
        let pattern = keys.iter().position(|k| *k == "pattern").unwrap();
        let count = keys.iter().position(|k| *k == "count").unwrap();
        assert!(pattern < count);
        assert!(!keys.contains(&"p"));
    }

    #[test]
    fn sections_merge_across_calls() {
        let mut settings = Settings::new();
        settings.merge_sections("[colors]\nerror = \"red\"\n".parse().unwrap());
        settings.merge_sections("[colors]\nwarning = \"yellow\"\n".parse().unwrap());
        let colors = settings.section("colors").unwrap();
        assert_eq!(colors["error"].as_str(), Some("red"));
        assert_eq!(colors["warning"].as_str(), Some("yellow"));
        assert!(settings.section("missing").is_none());
    }

    #[test]
    fn section_entries_cover_both_section_forms() {
        let mut settings = Settings::new();
        settings.merge_sections("[colors]\nerror = \"red\"\n".parse().unwrap());
        settings.merge_sections("[[servers]]\nname = \"a\"\n".parse().unwrap());
        settings.merge_sections("[[servers]]\nname = \"b\"\n".parse().unwrap());

        let colors = settings.section_entries("colors");
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0]["error"].as_str(), Some("red"));

        let servers: Vec<&str> = settings
            .section_entries("servers")
            .iter()
            .map(|entry| entry["name"].as_str().unwrap())
            .collect();
        assert_eq!(servers, vec!["a", "b"]);
        assert!(settings.section("servers").is_none());
        assert!(settings.section_entries("missing").is_empty());
    }

    #[test]
    fn dump_keeps_table_arrays() {
        let mut settings = sample_settings();
        settings.merge_sections("[[servers]]\nname = \"a\"\n".parse().unwrap());
        let doc: Table = settings.dump().unwrap().parse().unwrap();
        let servers = doc["servers"].as_array().unwrap();
        assert_eq!(servers[0]["name"].as_str(), Some("a"));
    }

    #[test]
    fn dump_contains_config_table_and_sections() {
        let mut settings = sample_settings();
        settings.merge_sections("[extra]\nk = 1\n".parse().unwrap());
        let dumped = settings.dump().unwrap();
        let doc: Table = dumped.parse().unwrap();
        assert_eq!(doc["config"]["pattern"].as_str(), Some("h"));
        assert_eq!(doc["config"]["count"].as_integer(), Some(0));
        assert_eq!(doc["extra"]["k"].as_integer(), Some(1));
    }

    #[test]
    fn string_list_replaced_from_text() {
        let mut settings = sample_settings();
        settings
            .set_from_source("exclude", "a, \"b,c\"", Source::Environment)
            .unwrap();
        assert_eq!(settings.string_list("exclude").unwrap(), ["a", "b,c"]);
    }

    #[test]
    fn metavar_defaults_to_upper_name() {
        let settings = sample_settings();
        assert_eq!(settings.setting("pattern").unwrap().metavar(), "PATTERN");
        assert_eq!(settings.setting("log-max").unwrap().metavar(), "SIZE");
    }
}
