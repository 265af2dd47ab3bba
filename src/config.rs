// SPDX-License-Identifier: MIT
use serde::Deserialize;

use crate::error::{ConverterError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Nesting limit for structural encode and decode
    pub max_depth: usize,
    /// Wire the built-in text and byte-string default converters
    pub builtin_defaults: bool,
    /// Longest type or field name accepted while decoding
    pub max_name_len: u32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            builtin_defaults: true,
            max_name_len: 4096,
        }
    }
}

impl ConverterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_depth: std::env::var("BINCONV_MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_depth),
            builtin_defaults: std::env::var("BINCONV_BUILTIN_DEFAULTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.builtin_defaults),
            max_name_len: std::env::var("BINCONV_MAX_NAME_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_name_len),
        }
    }

    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ConverterError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(ConverterError::Config(
                "max_depth must be at least 1".to_string(),
            ));
        }

        if self.max_name_len == 0 {
            return Err(ConverterError::Config(
                "max_name_len must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
