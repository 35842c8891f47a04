//! Configuration loading from disk.
//!
//! File format: one `key = value` per line, surrounding whitespace trimmed.
//! Blank lines and lines starting with `#` are skipped.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{ListenerConfig, PublisherConfig, LISTENER_KEYS, PUBLISHER_KEYS};
use crate::config::validation::{validate_keys, KeySchema, ValidationError};

/// Parsed key/value pairs.
pub type ConfigMap = BTreeMap<String, String>;

/// Syntax error in a configuration file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'=' is not found in line {line_no}: '{line}'")]
    MissingSeparator { line_no: usize, line: String },

    #[error("configuration key is not found in line {line_no}: '{line}'")]
    EmptyKey { line_no: usize, line: String },

    #[error("configuration key's ('{key}') value is not found in line {line_no}")]
    EmptyValue { line_no: usize, key: String },

    #[error("configuration key '{key}' is set twice (line {line_no})")]
    DuplicateKey { line_no: usize, key: String },
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file '{}' could not be found", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration file '{}' is not valid UTF-8", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("User-password file could not be opened: {}", path.display())]
    Credentials {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    /// True when the only problems are absent required keys.
    pub fn is_missing_keys(&self) -> bool {
        match self {
            ConfigError::Validation(errors) => errors
                .iter()
                .all(|e| matches!(e, ValidationError::MissingKey(_))),
            _ => false,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse configuration text into a key/value map.
pub fn parse_config(content: &str) -> Result<ConfigMap, ParseError> {
    let mut map = ConfigMap::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.starts_with('#') {
            continue;
        }

        let (key, value) = raw.split_once('=').ok_or_else(|| ParseError::MissingSeparator {
            line_no,
            line: raw.to_string(),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::EmptyKey {
                line_no,
                line: raw.to_string(),
            });
        }

        let value = value.trim();
        if value.is_empty() {
            return Err(ParseError::EmptyValue {
                line_no,
                key: key.to_string(),
            });
        }

        if map.insert(key.to_string(), value.to_string()).is_some() {
            return Err(ParseError::DuplicateKey {
                line_no,
                key: key.to_string(),
            });
        }
    }

    Ok(map)
}

/// Read, parse and key-check a configuration file.
pub fn read_config_file(path: &Path, schema: &KeySchema) -> Result<ConfigMap, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::InvalidData => ConfigError::Encoding {
            path: path.to_path_buf(),
            source,
        },
        _ => ConfigError::NotFound {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let map = parse_config(&content)?;
    validate_keys(&map, schema).map_err(ConfigError::Validation)?;
    Ok(map)
}

/// Load the listener configuration.
pub fn load_listener_config(path: &Path) -> Result<ListenerConfig, ConfigError> {
    let map = read_config_file(path, &LISTENER_KEYS)?;
    ListenerConfig::from_map(&map)
}

/// Load the publisher configuration.
pub fn load_publisher_config(path: &Path) -> Result<PublisherConfig, ConfigError> {
    let map = read_config_file(path, &PUBLISHER_KEYS)?;
    PublisherConfig::from_map(&map)
}

/// Read the `user:password` line from a credentials file.
pub fn read_credentials(path: &Path) -> Result<String, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Credentials {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content.lines().next().unwrap_or_default().trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let map = parse_config("A=1\n# comment\n\nB = 2\n").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["A"], "1");
        assert_eq!(map["B"], "2");
    }

    #[test]
    fn test_parse_trims_tabs_and_spaces() {
        let map = parse_config("\tAMQPHost \t=  localhost:5672 \t\n   \n").unwrap();
        assert_eq!(map["AMQPHost"], "localhost:5672");
    }

    #[test]
    fn test_parse_value_keeps_inner_equals() {
        let map = parse_config("RedisURI = redis://h:6379/?a=b\n").unwrap();
        assert_eq!(map["RedisURI"], "redis://h:6379/?a=b");
    }

    #[test]
    fn test_parse_missing_separator() {
        let err = parse_config("A=1\nnot a pair\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingSeparator {
                line_no: 2,
                line: "not a pair".into()
            }
        );
    }

    #[test]
    fn test_parse_empty_key_and_value() {
        assert!(matches!(parse_config(" = 1"), Err(ParseError::EmptyKey { .. })));
        assert!(matches!(parse_config("A =  "), Err(ParseError::EmptyValue { .. })));
    }

    #[test]
    fn test_parse_duplicate_key() {
        let err = parse_config("A=1\nA=2\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateKey { line_no: 2, .. }));
    }

    #[test]
    fn test_missing_keys_classification() {
        let missing = ConfigError::Validation(vec![ValidationError::MissingKey("A".into())]);
        assert!(missing.is_missing_keys());

        let mixed = ConfigError::Validation(vec![
            ValidationError::MissingKey("A".into()),
            ValidationError::UnknownKey("Z".into()),
        ]);
        assert!(!mixed.is_missing_keys());
    }

    #[test]
    fn test_read_credentials_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userpass");
        std::fs::write(&path, "guest:secret\r\nignored\n").unwrap();
        assert_eq!(read_credentials(&path).unwrap(), "guest:secret");
    }

    #[test]
    fn test_read_credentials_missing_file() {
        let err = read_credentials(Path::new("/nonexistent/ddc/userpass")).unwrap_err();
        assert!(matches!(err, ConfigError::Credentials { .. }));
    }

    #[test]
    fn test_read_config_file_classifies_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_config_file(&dir.path().join("absent.conf"), &LISTENER_KEYS).unwrap_err();
        assert!(matches!(missing, ConfigError::NotFound { .. }));

        let path = dir.path().join("latin1.conf");
        std::fs::write(&path, b"AMQPHost = h\xff\xfe\n").unwrap();
        let err = read_config_file(&path, &LISTENER_KEYS).unwrap_err();
        assert!(matches!(err, ConfigError::Encoding { .. }));
        assert!(err.to_string().contains("not valid UTF-8"));
    }
}
