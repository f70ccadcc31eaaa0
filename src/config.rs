//! Embedder-facing options.
//!
//! Options deserialize from TOML. Unknown keys are rejected so a typo in
//! an embedder's config surfaces as an error instead of silently doing
//! nothing.

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::value::{Value, ValueMap};

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("options parsing error")]
    Toml(#[from] toml::de::Error),
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Enable debug-level logging.
    pub verbose: bool,
    /// Refuse circular imports with a runtime fault instead of recursing.
    pub detect_cycles: bool,
    /// Seed values for the shared context of top-level loads.
    pub context: BTreeMap<String, toml::Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            detect_cycles: true,
            context: BTreeMap::new(),
        }
    }
}

impl Options {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// The `context` table as shared-context values.
    pub fn seed_context(&self) -> ValueMap {
        self.context
            .iter()
            .map(|(key, value)| (key.clone(), toml_to_value(value)))
            .collect()
    }
}

fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(n) => Value::Num(*n as f64),
        toml::Value::Float(n) => Value::Num(*n),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_value(v)))
                .collect(),
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(!options.verbose);
        assert!(options.detect_cycles);
        assert!(options.context.is_empty());
    }

    #[test]
    fn test_from_toml() {
        let options = Options::from_toml_str(
            r#"
            verbose = true

            [context]
            site = "wiki"
            page-size = 20
            "#,
        )
        .unwrap();
        assert!(options.verbose);
        assert!(options.detect_cycles);

        let context = options.seed_context();
        assert_eq!(context.get("site"), Some(&Value::str("wiki")));
        assert_eq!(context.get("page-size"), Some(&Value::Num(20.0)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Options::from_toml_str("verbos = true").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_nested_context_tables() {
        let options = Options::from_toml_str(
            r#"
            [context.theme]
            name = "dark"
            "#,
        )
        .unwrap();
        let context = options.seed_context();
        let theme = context.get("theme").and_then(Value::as_map).unwrap();
        assert_eq!(theme.get("name"), Some(&Value::str("dark")));
    }
}
