// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-field validation of a parsed [`FleetConfig`].

use crate::{ConfigError, FleetConfig};
use std::collections::HashSet;

/// Validate the whole configuration. Errors identify the offending
/// field so startup failures are actionable.
pub(crate) fn validate(config: &FleetConfig) -> Result<(), ConfigError> {
    let mut short_names = HashSet::new();
    let mut ports = HashSet::new();

    for (idx, service) in config.services.iter().enumerate() {
        let at = |field: &str| format!("services[{idx}].{field}");

        if service.name.trim().is_empty() {
            return Err(invalid(at("name"), "must not be empty"));
        }
        if service.short_name.trim().is_empty() {
            return Err(invalid(at("short_name"), "must not be empty"));
        }
        if !short_names.insert(service.short_name.as_str()) {
            return Err(invalid(
                at("short_name"),
                format!("duplicate short name {:?}", service.short_name),
            ));
        }
        if !ports.insert(service.grpc_port) {
            return Err(invalid(
                at("grpc_port"),
                format!("port {} is already claimed by another service", service.grpc_port),
            ));
        }
    }

    // Reference checks run after all short names are collected, so
    // forward references in file order are fine.
    for (idx, service) in config.services.iter().enumerate() {
        for dep in &service.dependencies {
            if dep == &service.short_name {
                return Err(invalid(
                    format!("services[{idx}].dependencies"),
                    format!("service {:?} depends on itself", service.short_name),
                ));
            }
            if !short_names.contains(dep.as_str()) {
                return Err(invalid(
                    format!("services[{idx}].dependencies"),
                    format!("unknown service {dep:?}"),
                ));
            }
        }
        for key in &service.external_dependencies {
            if !config.dependencies.contains_key(key) {
                return Err(invalid(
                    format!("services[{idx}].external_dependencies"),
                    format!("unknown dependency key {key:?}"),
                ));
            }
        }
    }

    for (key, dep) in &config.dependencies {
        if dep.url.trim().is_empty() {
            return Err(invalid(format!("dependencies.{key}.url"), "must not be empty"));
        }
    }

    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}
