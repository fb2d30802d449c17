//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What the registry does when a type name is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with [`ModelError::DuplicateType`](crate::ModelError::DuplicateType).
    #[default]
    Reject,
    /// Replace the previous registration.
    Overwrite,
}

/// What the synchronizer does with a change that starts inside the span
/// inserted by the change pushed before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Fail with [`ModelError::Order`](crate::ModelError::Order).
    #[default]
    Reject,
    /// Fold the two changes into one.
    Coalesce,
}

/// Per-session editor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub duplicate_registration: DuplicatePolicy,
    pub overlapping_changes: OverlapPolicy,
    /// Maximum number of undo steps kept by a surface.
    pub history_depth: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            duplicate_registration: DuplicatePolicy::Reject,
            overlapping_changes: OverlapPolicy::Reject,
            history_depth: Self::DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl EditorConfig {
    pub const DEFAULT_HISTORY_DEPTH: usize = 100;

    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `FOLIO_DUPLICATE_REGISTRATION`: `reject` (default) or `overwrite`
    /// - `FOLIO_OVERLAPPING_CHANGES`: `reject` (default) or `coalesce`
    /// - `FOLIO_HISTORY_DEPTH`: number of undo steps (default: 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration handed over by the host page as JSON. Missing
    /// fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("FOLIO_DUPLICATE_REGISTRATION") {
            config.duplicate_registration = match value.trim().to_ascii_lowercase().as_str() {
                "reject" => DuplicatePolicy::Reject,
                "overwrite" => DuplicatePolicy::Overwrite,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "FOLIO_DUPLICATE_REGISTRATION",
                        value,
                        expected: "expected `reject` or `overwrite`",
                    });
                }
            };
        }

        if let Some(value) = lookup("FOLIO_OVERLAPPING_CHANGES") {
            config.overlapping_changes = match value.trim().to_ascii_lowercase().as_str() {
                "reject" => OverlapPolicy::Reject,
                "coalesce" => OverlapPolicy::Coalesce,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "FOLIO_OVERLAPPING_CHANGES",
                        value,
                        expected: "expected `reject` or `coalesce`",
                    });
                }
            };
        }

        if let Some(value) = lookup("FOLIO_HISTORY_DEPTH") {
            config.history_depth =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: "FOLIO_HISTORY_DEPTH",
                        value,
                        expected: "expected a non-negative integer",
                    })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults_fail_closed() {
        let config = EditorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.duplicate_registration, DuplicatePolicy::Reject);
        assert_eq!(config.overlapping_changes, OverlapPolicy::Reject);
    }

    #[test]
    fn test_env_overrides() {
        let config = EditorConfig::from_lookup(lookup(&[
            ("FOLIO_DUPLICATE_REGISTRATION", "Overwrite"),
            ("FOLIO_OVERLAPPING_CHANGES", "coalesce"),
            ("FOLIO_HISTORY_DEPTH", " 7 "),
        ]))
        .unwrap();
        assert_eq!(config.duplicate_registration, DuplicatePolicy::Overwrite);
        assert_eq!(config.overlapping_changes, OverlapPolicy::Coalesce);
        assert_eq!(config.history_depth, 7);
    }

    #[test]
    fn test_invalid_value() {
        let err = EditorConfig::from_lookup(lookup(&[("FOLIO_HISTORY_DEPTH", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "FOLIO_HISTORY_DEPTH",
                ..
            }
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EditorConfig::from_json(r#"{"overlapping_changes":"coalesce","history_depth":5}"#)
                .unwrap();
        assert_eq!(config.overlapping_changes, OverlapPolicy::Coalesce);
        assert_eq!(config.history_depth, 5);
        assert_eq!(config.duplicate_registration, DuplicatePolicy::Reject);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EditorConfig::from_json(&json).unwrap(), config);
        assert_eq!(EditorConfig::from_json("{}").unwrap(), EditorConfig::default());
    }

    #[test]
    fn test_invalid_json() {
        let err = EditorConfig::from_json(r#"{"duplicate_registration":"Sometimes"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
