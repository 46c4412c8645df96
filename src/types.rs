use std::fmt;

/// Where a setting's current value came from.
///
/// Ordered lowest precedence first: a value from a later tier always replaces
/// one from an earlier tier, and a value from the same tier replaces the
/// previous one (so later config files win over earlier ones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    Default,
    ConfigFile,
    Environment,
    CommandLine,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Default => "default",
            Source::ConfigFile => "config file",
            Source::Environment => "environment",
            Source::CommandLine => "command line",
        };
        f.write_str(name)
    }
}

/// The type of a setting, which decides how raw text is coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    String,
    Boolean,
    Integer,
    StringList,
    /// One of a fixed set of strings. The first entry is the default.
    Choice(Vec<String>),
    /// An integer byte count, written with optional `k`/`ki`/`m`/... suffixes.
    ByteSize,
}

impl Kind {
    /// Whether a command-line flag for this kind takes an argument.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Kind::Boolean)
    }
}

/// A typed setting value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Whether the value counts as "set" for [`Settings::require`](crate::Settings::require).
    pub fn is_present(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Bool(_) | Value::Int(_) => true,
        }
    }

    pub fn to_toml(&self) -> toml::Value {
        match self {
            Value::Str(s) => toml::Value::String(s.clone()),
            Value::Bool(b) => toml::Value::Boolean(*b),
            Value::Int(i) => toml::Value::Integer(*i),
            Value::List(l) => {
                toml::Value::Array(l.iter().cloned().map(toml::Value::String).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if item.contains(',') {
                        write!(f, "\"{item}\"")?;
                    } else {
                        f.write_str(item)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Vec<String>> for Value {
    fn from(l: Vec<String>) -> Self {
        Value::List(l)
    }
}

impl From<&[&str]> for Value {
    fn from(l: &[&str]) -> Self {
        Value::List(l.iter().map(|s| s.to_string()).collect())
    }
}

/// A value on its way into the registry: either raw text that still needs
/// coercion, or something already typed (booleans from flags, lists from
/// repeated options, scalars from config files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    Typed(Value),
}

/// The states a run passes through. `Failed` is reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    SettingsLoaded,
    LoggingReady,
    Dispatched,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::SettingsLoaded => "settings-loaded",
            Stage::LoggingReady => "logging-ready",
            Stage::Dispatched => "dispatched",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}
