//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::StreamerConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    endpoint: String,
    dataset_root: Option<String>,
    dataset_version: String,
    end_of_scene: String,
    policy: String,
    max_staleness_ms: u64,
    session_queue_capacity: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    endpoint: format!("ws://{}:{}", config.server.host, config.server.port),
                    dataset_root: config
                        .dataset
                        .root
                        .as_ref()
                        .map(|p| p.display().to_string()),
                    dataset_version: config.dataset.version.clone(),
                    end_of_scene: format!("{:?}", config.scene.end_of_scene),
                    policy: format!("{:?}", config.sync.policy),
                    max_staleness_ms: config.sync.max_staleness_ms,
                    session_queue_capacity: config.server.session_queue_capacity,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(config: &StreamerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.dataset.root.is_none() {
        warnings.push(
            "dataset.root is not set - pass --dataroot, set TRUCKSCENES_DATAROOT or use --synthetic"
                .to_string(),
        );
    }

    // one tick fans out roughly one message per channel
    if config.server.session_queue_capacity < 32 {
        warnings.push(format!(
            "server.session_queue_capacity = {} is below one tick of messages; slow viewers will drop frames",
            config.server.session_queue_capacity
        ));
    }

    if let Some(hz) = config.sync.publish_rate_hz {
        let period_ms = 1000.0 / hz;
        if (config.sync.max_staleness_ms as f64) < period_ms {
            warnings.push(format!(
                "sync.max_staleness_ms ({}) is shorter than the publish period ({period_ms:.1} ms); channels will flicker",
                config.sync.max_staleness_ms
            ));
        }
    }

    if config.encoder.entity_lifetime_ms < config.sync.max_staleness_ms {
        warnings.push(
            "encoder.entity_lifetime_ms is shorter than sync.max_staleness_ms; point clouds may blink out between samples"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Endpoint: {}", summary.endpoint);
            println!(
                "  Dataset: {} ({})",
                summary.dataset_root.as_deref().unwrap_or("<unset>"),
                summary.dataset_version
            );
            println!("  End of scene: {}", summary.end_of_scene);
            println!(
                "  Selection: {} within {} ms",
                summary.policy, summary.max_staleness_ms
            );
            println!("  Session queue: {}", summary.session_queue_capacity);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn validate_file(content: &str) -> ValidationResult {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        })
    }

    #[test]
    fn test_empty_file_is_valid_with_warning() {
        let result = validate_file("");
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("dataset.root")));
    }

    #[test]
    fn test_zero_port_is_invalid() {
        let result = validate_file("[server]\nport = 0\n");
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "/nonexistent/streamer.toml".into(),
            json: true,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
