//! Coercion of raw text and TOML values into typed setting values.
//!
//! Every function here returns a plain reason string on failure; the settings
//! registry wraps it into [`ConfigError::InvalidValue`](crate::ConfigError)
//! together with the setting name.

use crate::types::{Kind, Value};

const TRUES: &[&str] = &["yes", "on", "1", "true"];
const FALSES: &[&str] = &["no", "off", "0", "false"];

/// Coerce raw text (from the environment, the command line or a string in a
/// config file) into a value of `kind`.
pub fn coerce(kind: &Kind, raw: &str) -> Result<Value, String> {
    match kind {
        Kind::String => Ok(Value::Str(raw.to_string())),
        Kind::Boolean => parse_bool(raw).map(Value::Bool),
        Kind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("'{raw}' is not an integer")),
        Kind::StringList => Ok(Value::List(parse_string_list(raw))),
        Kind::Choice(choices) => check_choice(choices, raw).map(Value::Str),
        Kind::ByteSize => parse_byte_size(raw).map(Value::Int),
    }
}

/// Check that an already-typed value fits `kind`.
pub fn check(kind: &Kind, value: Value) -> Result<Value, String> {
    match (kind, value) {
        (Kind::String, v @ Value::Str(_)) => Ok(v),
        (Kind::Boolean, v @ Value::Bool(_)) => Ok(v),
        (Kind::Integer | Kind::ByteSize, v @ Value::Int(_)) => Ok(v),
        (Kind::StringList, v @ Value::List(_)) => Ok(v),
        (Kind::Choice(choices), Value::Str(s)) => check_choice(choices, &s).map(Value::Str),
        (kind, Value::Str(s)) => coerce(kind, &s),
        (kind, other) => Err(format!("expected {}, got '{other}'", describe(kind))),
    }
}

/// Convert a TOML value from a config file into a value of `kind`.
///
/// Scalars of the "wrong" TOML type are read through their text form, so
/// `log-keep = "5"` and `log-keep = 5` mean the same thing.
pub fn from_toml(kind: &Kind, value: &toml::Value) -> Result<Value, String> {
    match value {
        toml::Value::String(s) => coerce(kind, s),
        toml::Value::Boolean(b) => match kind {
            Kind::Boolean => Ok(Value::Bool(*b)),
            other => coerce(other, &b.to_string()),
        },
        toml::Value::Integer(i) => match kind {
            Kind::Integer | Kind::ByteSize => Ok(Value::Int(*i)),
            other => coerce(other, &i.to_string()),
        },
        toml::Value::Float(f) => coerce(kind, &f.to_string()),
        toml::Value::Array(items) => match kind {
            Kind::StringList => items
                .iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s.clone()),
                    toml::Value::Integer(i) => Ok(i.to_string()),
                    toml::Value::Float(f) => Ok(f.to_string()),
                    toml::Value::Boolean(b) => Ok(b.to_string()),
                    other => Err(format!("list items must be scalars, got {}", other.type_str())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(format!("expected {}, got an array", describe(other))),
        },
        other => Err(format!(
            "expected {}, got {}",
            describe(kind),
            other.type_str()
        )),
    }
}

/// Parse a boolean. Accepts `yes|on|1|true` and `no|off|0|false`, any case.
pub fn parse_bool(raw: &str) -> Result<bool, String> {
    let lower = raw.trim().to_lowercase();
    if TRUES.contains(&lower.as_str()) {
        Ok(true)
    } else if FALSES.contains(&lower.as_str()) {
        Ok(false)
    } else {
        Err(format!("'{raw}' is not a boolean (use yes/no, true/false, on/off, 1/0)"))
    }
}

/// Split comma-separated text into items. Double quotes protect commas and
/// are removed; items are trimmed.
pub fn parse_string_list(raw: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut inside_quote = false;

    for c in raw.chars() {
        match c {
            '"' => inside_quote = !inside_quote,
            ',' if !inside_quote => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        values.push(current);
    }

    values.into_iter().map(|v| v.trim().to_string()).collect()
}

/// Parse a human-readable size like `10`, `1.5k`, `2MiB` or `3 gb` into bytes.
///
/// Decimal suffixes (`k`, `m`, `g`, `t`) are powers of 1000, binary suffixes
/// (`ki`, `mi`, `gi`, `ti`) are powers of 1024. A trailing `b` is optional.
pub fn parse_byte_size(raw: &str) -> Result<i64, String> {
    let lower = raw.trim().to_lowercase();
    let split = lower
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(lower.len());
    let (number, unit) = lower.split_at(split);
    let unit = unit.trim();
    let unit = unit.strip_suffix('b').unwrap_or(unit);

    let number: f64 = number
        .parse()
        .map_err(|_| format!("'{raw}' is not a size"))?;
    let multiplier: u64 = match unit {
        "" => 1,
        "k" => 1_000,
        "m" => 1_000_000,
        "g" => 1_000_000_000,
        "t" => 1_000_000_000_000,
        "ki" => 1 << 10,
        "mi" => 1 << 20,
        "gi" => 1 << 30,
        "ti" => 1 << 40,
        _ => return Err(format!("'{raw}' has an unknown size unit")),
    };

    Ok((number * multiplier as f64) as i64)
}

fn check_choice(choices: &[String], raw: &str) -> Result<String, String> {
    if choices.iter().any(|c| c == raw) {
        Ok(raw.to_string())
    } else {
        Err(format!("'{raw}' is not one of: {}", choices.join(", ")))
    }
}

fn describe(kind: &Kind) -> &'static str {
    match kind {
        Kind::String => "a string",
        Kind::Boolean => "a boolean",
        Kind::Integer => "an integer",
        Kind::StringList => "a list of strings",
        Kind::Choice(_) => "one of the allowed choices",
        Kind::ByteSize => "a size",
    }
}
