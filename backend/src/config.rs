//! Engine configuration
//!
//! Resolution order:
//! 1. Environment variables (`LENDING_*`, highest priority)
//! 2. TOML file passed by the caller
//! 3. Built-in defaults
//!
//! ```toml
//! overpayment_policy = "reject"
//! default_mode = "Weekly"
//! control_number_prefix = "LN"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// What to do when `amount_paid > amount_due`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverpaymentPolicy {
    /// Store the payment as submitted
    #[default]
    Accept,
    /// Clamp `amount_paid` to `amount_due`
    Cap,
    /// Fail with a validation error
    Reject,
}

impl FromStr for OverpaymentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(OverpaymentPolicy::Accept),
            "cap" => Ok(OverpaymentPolicy::Cap),
            "reject" => Ok(OverpaymentPolicy::Reject),
            other => Err(format!("unknown overpayment policy '{}'", other)),
        }
    }
}

/// Configuration for [`LendingEngine`](crate::engine::LendingEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingConfig {
    #[serde(default)]
    pub overpayment_policy: OverpaymentPolicy,

    /// Payment frequency label for loans created without one
    #[serde(default = "default_mode")]
    pub default_mode: String,

    /// Prefix of generated loan control numbers
    #[serde(default = "default_control_number_prefix")]
    pub control_number_prefix: String,
}

fn default_mode() -> String {
    crate::models::loan::DEFAULT_MODE.to_string()
}

fn default_control_number_prefix() -> String {
    "LN".to_string()
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            overpayment_policy: OverpaymentPolicy::default(),
            default_mode: default_mode(),
            control_number_prefix: default_control_number_prefix(),
        }
    }
}

impl LendingConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load `path` when given, otherwise defaults; then apply env overrides
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `LENDING_*` overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup("LENDING_OVERPAYMENT_POLICY") {
            self.overpayment_policy = policy.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LENDING_OVERPAYMENT_POLICY",
                value: policy.clone(),
            })?;
        }

        if let Some(mode) = lookup("LENDING_DEFAULT_MODE") {
            if !mode.trim().is_empty() {
                self.default_mode = mode.trim().to_string();
            }
        }

        if let Some(prefix) = lookup("LENDING_CONTROL_NUMBER_PREFIX") {
            if !prefix.trim().is_empty() {
                self.control_number_prefix = prefix.trim().to_string();
            }
        }

        Ok(self)
    }
}
