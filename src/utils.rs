use std::time::Duration;

use sentry_tee::Tags;
use serde_json::Value;

pub fn parse_key_value(pair: &str) -> eyre::Result<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| eyre::eyre!("expected key=value, got {:?}", pair))?;

    let key = key.trim();
    if key.is_empty() {
        eyre::bail!("empty key in {:?}", pair);
    }

    Ok((key.to_string(), value.trim().to_string()))
}

/// Parses a comma separated list of `key=value` pairs.
pub fn parse_tags(list: &str) -> eyre::Result<Tags> {
    list.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(parse_key_value)
        .collect()
}

/// Parses `key=value` where the value is taken as JSON when it is valid JSON and as a plain
/// string otherwise.
pub fn parse_field(pair: &str) -> eyre::Result<(String, Value)> {
    let (key, raw) = parse_key_value(pair)?;
    let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    Ok((key, value))
}

pub fn parse_bool(value: &str) -> eyre::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(eyre::eyre!("expected a boolean, got {:?}", other)),
    }
}

pub fn parse_duration(h_time: &str) -> eyre::Result<Duration> {
    Ok(humantime::parse_duration(h_time)?)
}
