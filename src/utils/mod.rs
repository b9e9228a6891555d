//! Small helpers around the dispatch pipeline: JSON file I/O, pretty
//! printing, IPv4 validation and device-record formatting.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub fn load_json_from_file(path: impl AsRef<Path>) -> Result<Value, UtilError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| UtilError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| UtilError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `data` as indented JSON, replacing any existing file.
pub fn save_json_to_file<T: Serialize + ?Sized>(
    data: &T,
    path: impl AsRef<Path>,
) -> Result<(), UtilError> {
    let path = path.as_ref();
    let rendered = to_indented_json(data).map_err(|source| UtilError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, rendered).map_err(|source| UtilError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("saved JSON to {}", path.display());
    Ok(())
}

/// Re-indents a JSON document. Invalid input yields an error message
/// instead of failing.
pub fn pretty_print_json(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => to_indented_json(&value)
            .unwrap_or_else(|err| format!("Error formatting JSON: {err}")),
        Err(_) => "Error: invalid JSON data".to_string(),
    }
}

static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").expect("invalid ipv4 regex"));

/// Dotted-quad IPv4 check with every octet in `0..=255`.
pub fn validate_ip(ip: &str) -> bool {
    IPV4_RE.is_match(ip)
        && ip
            .split('.')
            .all(|octet| octet.parse::<u16>().is_ok_and(|value| value <= 255))
}

/// Pretty JSON device record; `extra` fields override the named ones.
pub fn format_device_data(
    ip: &str,
    country: &str,
    city: &str,
    user_agent: &str,
    extra: Map<String, Value>,
) -> String {
    let mut record = Map::new();
    record.insert("IPv4".into(), Value::from(ip));
    record.insert("country_name".into(), Value::from(country));
    record.insert("city".into(), Value::from(city));
    record.insert("userAgent".into(), Value::from(user_agent));
    record.extend(extra);
    to_indented_json(&Value::Object(record)).unwrap_or_default()
}

/// Pretty JSON with four-space indentation.
fn to_indented_json<T: Serialize + ?Sized>(data: &T) -> serde_json::Result<String> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    data.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[derive(Debug, Error)]
pub enum UtilError {
    #[error("I/O error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("JSON invalid at {path:?}: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        save_json_to_file(&json!({"name": "ação"}), &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("ação"));
        assert!(written.starts_with("{\n    \"name\""));
        assert_eq!(load_json_from_file(&path).unwrap()["name"], "ação");
    }

    #[test]
    fn load_reports_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(load_json_from_file(&missing), Err(UtilError::Io { .. })));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{not json").unwrap();
        assert!(matches!(
            load_json_from_file(&broken),
            Err(UtilError::InvalidJson { .. })
        ));
    }

    #[test]
    fn pretty_print_handles_invalid_input() {
        assert_eq!(pretty_print_json(r#"{"a":1}"#), "{\n    \"a\": 1\n}");
        assert_eq!(pretty_print_json("nope"), "Error: invalid JSON data");
    }

    #[test]
    fn ipv4_validation() {
        assert!(validate_ip("173.166.164.121"));
        assert!(validate_ip("0.0.0.0"));
        assert!(!validate_ip("256.1.1.1"));
        assert!(!validate_ip("1.2.3"));
        assert!(!validate_ip("a.b.c.d"));
    }

    #[test]
    fn device_data_merges_extra_fields() {
        let mut extra = Map::new();
        extra.insert("postal".into(), json!("1000-001"));
        extra.insert("city".into(), json!("Porto"));
        let rendered = format_device_data("10.0.0.1", "Portugal", "Lisbon", "ua", extra);
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["city"], "Porto");
        assert_eq!(value["postal"], "1000-001");
        assert_eq!(value["IPv4"], "10.0.0.1");
    }
}
