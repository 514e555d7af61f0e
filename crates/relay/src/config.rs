// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Deployment configuration for the reassembly function
//!
//! ```yaml
//! function_name: decompress
//! budget_secs: 900
//! safety_margin_secs: 60
//! part_threshold_mb: 100
//! read_unit_mb: 10
//! store:
//!   kind: s3
//!   region: us-east-1
//! invoker:
//!   kind: http
//!   endpoint: http://localhost:9001/2015-03-31/functions/{function}/invocations
//! ```

use crate::budget::HANDOFF_SAFETY_MARGIN;
use crate::{MB, RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_budget_secs() -> u64 {
    900
}

fn default_safety_margin_secs() -> u64 {
    HANDOFF_SAFETY_MARGIN.as_secs()
}

fn default_part_threshold_mb() -> usize {
    100
}

fn default_read_unit_mb() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Function re-invoked at handoff
    pub function_name: String,

    /// Wall-clock time granted to one execution
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,

    /// Remaining time below which an execution hands off
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Decoded bytes per uploaded part
    #[serde(default = "default_part_threshold_mb")]
    pub part_threshold_mb: usize,

    /// Upper bound of one decoder read
    #[serde(default = "default_read_unit_mb")]
    pub read_unit_mb: usize,

    /// Required, there is no default store
    pub store: StoreConfig,

    pub invoker: InvokerConfig,
}

/// Where buckets live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// S3 or an S3-compatible service; unset fields come from AWS_* variables
    S3 {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        allow_http: bool,
        #[serde(default)]
        access_key: Option<String>,
        #[serde(default)]
        secret_key: Option<String>,
    },
    /// Process-local buckets, for tests and local runs
    Memory,
}

/// How the next execution is triggered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InvokerConfig {
    /// POST the payload to an invoke endpoint; `{function}` is substituted
    Http { endpoint: String },
    /// Spawn a local program and feed the payload on stdin
    Process {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl RelayConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            RelayError::Configuration(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.function_name.is_empty() {
            return Err(RelayError::Configuration(
                "function_name cannot be empty".to_string(),
            ));
        }
        if self.part_threshold_mb == 0 {
            return Err(RelayError::Configuration(
                "part_threshold_mb must be greater than 0".to_string(),
            ));
        }
        if self.read_unit_mb == 0 {
            return Err(RelayError::Configuration(
                "read_unit_mb must be greater than 0".to_string(),
            ));
        }
        if self.safety_margin_secs >= self.budget_secs {
            return Err(RelayError::Configuration(format!(
                "safety_margin_secs ({}) must be below budget_secs ({})",
                self.safety_margin_secs, self.budget_secs
            )));
        }
        match &self.invoker {
            InvokerConfig::Http { endpoint } if endpoint.is_empty() => Err(
                RelayError::Configuration("invoker endpoint cannot be empty".to_string()),
            ),
            InvokerConfig::Process { program, .. } if program.is_empty() => Err(
                RelayError::Configuration("invoker program cannot be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    #[must_use]
    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    #[must_use]
    pub fn part_threshold(&self) -> usize {
        self.part_threshold_mb * MB
    }

    #[must_use]
    pub fn read_unit(&self) -> usize {
        self.read_unit_mb * MB
    }
}
