//! Configuration key validation.
//!
//! # Responsibilities
//! - Reject keys the program does not declare
//! - Report every required key that is absent
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function over the parsed key/value map

use std::fmt;

use crate::config::loader::ConfigMap;

/// Declared keys for one program.
#[derive(Debug, Clone, Copy)]
pub struct KeySchema {
    /// Keys that must be present.
    pub required: &'static [&'static str],
    /// Keys that may be present.
    pub optional: &'static [&'static str],
}

impl KeySchema {
    fn declares(&self, key: &str) -> bool {
        self.required.contains(&key) || self.optional.contains(&key)
    }
}

/// A single key-level problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Key is not part of the schema.
    UnknownKey(String),
    /// Required key is missing.
    MissingKey(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownKey(key) => write!(f, "unknown key '{}' in configuration", key),
            ValidationError::MissingKey(key) => {
                write!(f, "Value for '{}' is not found in configuration", key)
            }
        }
    }
}

/// Check `map` against `schema`.
pub fn validate_keys(map: &ConfigMap, schema: &KeySchema) -> Result<(), Vec<ValidationError>> {
    let mut errors: Vec<ValidationError> = map
        .keys()
        .filter(|key| !schema.declares(key))
        .map(|key| ValidationError::UnknownKey(key.clone()))
        .collect();

    errors.extend(
        schema
            .required
            .iter()
            .filter(|key| !map.contains_key(**key))
            .map(|key| ValidationError::MissingKey(key.to_string())),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: KeySchema = KeySchema {
        required: &["A", "B"],
        optional: &["C"],
    };

    fn map(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_accepts_required_and_optional() {
        assert!(validate_keys(&map(&[("A", "1"), ("B", "2")]), &SCHEMA).is_ok());
        assert!(validate_keys(&map(&[("A", "1"), ("B", "2"), ("C", "3")]), &SCHEMA).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let errors = validate_keys(&map(&[("A", "1"), ("Z", "9")]), &SCHEMA).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::UnknownKey("Z".into()),
                ValidationError::MissingKey("B".into()),
            ]
        );
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::MissingKey("AMQPHost".into());
        assert_eq!(err.to_string(), "Value for 'AMQPHost' is not found in configuration");
    }
}
