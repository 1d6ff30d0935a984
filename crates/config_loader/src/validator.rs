//! Configuration validation
//!
//! Rules:
//! - declared ranges (`validator` derive): ports > 0, rates and staleness > 0,
//!   queue capacities and point caps >= 1
//! - colour channels within [0, 1]
//! - server name and host non-empty
//! - scene id, when set, non-empty

use std::borrow::Cow;

use contracts::{ContractError, Rgba, StreamerConfig};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a StreamerConfig
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &StreamerConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_colors(config)?;
    validate_server(config)?;
    validate_scene(config)?;
    Ok(())
}

fn validate_ranges(config: &StreamerConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Depth-first walk to the first field error, in sorted key order so the
/// reported field is stable.
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut keys: Vec<&Cow<'static, str>> = errors.errors().keys().collect();
    keys.sort();

    for key in keys {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        match errors.errors().get(key)? {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(err) = field_errors.first() {
                    let message = match &err.message {
                        Some(m) => m.to_string(),
                        None => describe(err),
                    };
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{index}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn describe(err: &::validator::ValidationError) -> String {
    let mut params: Vec<String> = err
        .params
        .iter()
        .filter(|(k, _)| k.as_ref() != "value")
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    params.sort();

    let value = err
        .params
        .get("value")
        .map(|v| format!(", got {v}"))
        .unwrap_or_default();

    if params.is_empty() {
        format!("failed '{}' check{value}", err.code)
    } else {
        format!("must satisfy {} ({}){value}", err.code, params.join(", "))
    }
}

fn validate_colors(config: &StreamerConfig) -> Result<(), ContractError> {
    check_color("encoder.lidar.color", &config.encoder.lidar.color)?;
    check_color("encoder.radar.color", &config.encoder.radar.color)?;
    Ok(())
}

fn check_color(field: &str, color: &Rgba) -> Result<(), ContractError> {
    for (channel, value) in color.channels() {
        if !(0.0..=1.0).contains(&value) {
            return Err(ContractError::config_validation(
                format!("{field}.{channel}"),
                format!("colour channel must be within [0, 1], got {value}"),
            ));
        }
    }
    Ok(())
}

fn validate_server(config: &StreamerConfig) -> Result<(), ContractError> {
    if config.server.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "server.name",
            "server name must not be empty",
        ));
    }
    if config.server.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "server.host",
            "host must not be empty",
        ));
    }
    Ok(())
}

fn validate_scene(config: &StreamerConfig) -> Result<(), ContractError> {
    if let Some(id) = &config.scene.id {
        if id.trim().is_empty() {
            return Err(ContractError::config_validation(
                "scene.id",
                "scene id must not be empty when set",
            ));
        }
    }
    Ok(())
}
