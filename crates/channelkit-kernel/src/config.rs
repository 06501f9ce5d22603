//! Context configuration.
//!
//! ```toml
//! [dispatch]
//! batch_fallback = "unavailable"   # or "per_item"
//! ```
//!
//! Every key is optional; an empty document yields the defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub batch_fallback: BatchFallback,
}

/// What a single-fetch handler does with a multi-identity request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFallback {
    /// Reject the whole group with `unavailable`.
    #[default]
    Unavailable,

    /// Fetch each identity on its own and join the results in order.
    PerItem,
}

impl ContextConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: origin.to_string(),
            source,
        })
    }

    pub fn with_batch_fallback(mut self, fallback: BatchFallback) -> Self {
        self.dispatch.batch_fallback = fallback;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ContextConfig::from_toml_str("").expect("empty config must parse");
        assert_eq!(config, ContextConfig::default());
        assert_eq!(config.dispatch.batch_fallback, BatchFallback::Unavailable);
    }

    #[test]
    fn per_item_fallback_parses() {
        let config = ContextConfig::from_toml_str(
            r#"
            [dispatch]
            batch_fallback = "per_item"
            "#,
        )
        .expect("config must parse");
        assert_eq!(config.dispatch.batch_fallback, BatchFallback::PerItem);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ContextConfig::from_toml_str("[dispatch]\nretries = 3\n")
            .expect_err("unknown key must fail");
        assert!(matches!(err, ConfigError::ParseToml { ref path, .. } if path == "<inline>"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ContextConfig::from_path("/nonexistent/channelkit.toml")
            .expect_err("missing file must fail");
        assert!(err.to_string().contains("/nonexistent/channelkit.toml"));
    }
}
