// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet configuration: the TOML file declaring the orchestrator's
//! managed services and their external dependencies.
//!
//! Descriptors are immutable after load. Parsing is strict
//! (`deny_unknown_fields`); validation failures name the offending
//! field.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod duration;
mod validate;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating a fleet configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {field}: {message}")]
    Invalid { field: String, message: String },
}

/// The whole fleet configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// External dependencies keyed by the names services reference.
    #[serde(default)]
    pub dependencies: HashMap<String, ExternalDependency>,
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

/// Root `orchestrator` table: global paths and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(with = "duration::serde_str", default = "default_startup_timeout")]
    pub startup_timeout: Duration,
    #[serde(with = "duration::serde_str", default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
    #[serde(with = "duration::serde_str", default = "default_health_interval")]
    pub health_check_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            log_dir: None,
            startup_timeout: default_startup_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            health_check_interval: default_health_interval(),
        }
    }
}

/// An external dependency probed before startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalDependency {
    pub name: String,
    /// Probe kind; "http" is the only kind probed today, others are
    /// logged and skipped.
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub required: bool,
}

/// One managed service descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDef {
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    /// Primary (RPC) port; unique across services.
    pub grpc_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    /// Executable plus argument vector. Empty means
    /// `<binary_path> serve <short_name>`.
    #[serde(default)]
    pub command: Vec<String>,
    /// Short names this service waits for at startup.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Keys into the `dependencies` table.
    #[serde(default)]
    pub external_dependencies: Vec<String>,
    #[serde(default = "default_start_order")]
    pub start_order: i32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub health_check: ProbeConfig,
}

impl ServiceDef {
    /// The command actually spawned, applying the empty-command default.
    pub fn effective_command(&self, binary_path: &Path) -> Vec<String> {
        if self.command.is_empty() {
            vec![
                binary_path.display().to_string(),
                "serve".to_string(),
                self.short_name.clone(),
            ]
        } else {
            self.command.clone()
        }
    }
}

/// Health probe kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Rpc,
    Http,
    Tcp,
}

/// Nested `health_check` table of a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    #[serde(rename = "type", default)]
    pub kind: ProbeKind,
    #[serde(default = "default_probe_endpoint")]
    pub endpoint: String,
    #[serde(with = "duration::serde_str", default = "default_health_interval")]
    pub interval: Duration,
    #[serde(with = "duration::serde_str", default = "default_probe_timeout")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Rpc,
            endpoint: default_probe_endpoint(),
            interval: default_health_interval(),
            timeout: default_probe_timeout(),
        }
    }
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("./bin/flotilla")
}

fn default_startup_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_health_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_probe_endpoint() -> String {
    "/health".to_string()
}

fn default_start_order() -> i32 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_enabled() -> bool {
    true
}

impl FleetConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Cross-field validation; see the `validate` module.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::validate(self)
    }

    /// Enabled services in ascending start order (stable for equal
    /// orders, preserving file order).
    pub fn enabled_in_start_order(&self) -> Vec<&ServiceDef> {
        let mut services: Vec<&ServiceDef> = self.services.iter().filter(|s| s.enabled).collect();
        services.sort_by_key(|s| s.start_order);
        services
    }

    pub fn service(&self, short_name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.short_name == short_name)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
