//! Tracer configuration.
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables (`QIRT_TRACER_` prefix)
//! 2. Configuration file (YAML)
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use qirt_rt::ConfigError;

use crate::layer::{Duration, OpId};

/// Settings for the layering tracer and its metrics report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Preferred duration of a layer. Longer operations widen the layer
    /// they open.
    #[serde(default)]
    pub preferred_layer_duration: Duration,

    /// Display names of operations in the metrics report.
    #[serde(default)]
    pub op_names: BTreeMap<OpId, String>,

    /// Column separator of the metrics report.
    #[serde(default = "default_separator")]
    pub metrics_separator: String,

    /// Print `0` instead of an empty cell for absent operations.
    #[serde(default)]
    pub print_zero_metrics: bool,
}

fn default_separator() -> String {
    "\t".to_string()
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            preferred_layer_duration: 0,
            op_names: BTreeMap::new(),
            metrics_separator: default_separator(),
            print_zero_metrics: false,
        }
    }
}

impl TracerConfig {
    /// Parse configuration from a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml_ng::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml_str(&contents)
    }

    /// Load configuration from a file if provided, then apply environment
    /// overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_env()
    }

    /// Merge environment variables into this configuration.
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn merge_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("QIRT_TRACER_LAYER_DURATION") {
            self.preferred_layer_duration = v.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "QIRT_TRACER_LAYER_DURATION: expected an integer, got '{v}'"
                ))
            })?;
        }
        if let Some(v) = lookup("QIRT_TRACER_SEPARATOR") {
            self.metrics_separator = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preferred_layer_duration < 0 {
            return Err(ConfigError::ValidationError(format!(
                "preferred_layer_duration must not be negative, got {}",
                self.preferred_layer_duration
            )));
        }
        if self.metrics_separator.is_empty() {
            return Err(ConfigError::ValidationError(
                "metrics_separator must not be empty".into(),
            ));
        }
        if let Some((id, _)) = self.op_names.iter().find(|(_, name)| name.is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "operation {id} has an empty name"
            )));
        }
        Ok(())
    }
}
