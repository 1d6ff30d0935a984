//! Configuration and sample store resolution shared by commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{SampleStore, StreamerConfig};
use tracing::info;

use crate::cli::SourceArgs;
use crate::error::CliError;

/// Load the config file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<StreamerConfig> {
    let Some(path) = path else {
        info!("No configuration file, using defaults");
        return Ok(StreamerConfig::default());
    };

    if !path.exists() {
        return Err(CliError::ConfigNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    info!(config = %path.display(), "Loading configuration");
    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Open the dataset (CLI root, then config root) or the synthetic recording
pub fn open_store(source: &SourceArgs, config: &StreamerConfig) -> Result<Arc<dyn SampleStore>> {
    let root = if source.synthetic {
        None
    } else {
        let root = source
            .dataroot
            .clone()
            .or_else(|| config.dataset.root.clone())
            .ok_or(CliError::NoDataset)?;
        Some(root)
    };

    let store = scene_store::open_store(root.as_deref()).with_context(|| match &root {
        Some(root) => format!("Failed to open dataset at {}", root.display()),
        None => "Failed to build synthetic recording".to_string(),
    })?;

    if store.scene_count() == 0 {
        return Err(CliError::EmptyStore {
            store: store.name().to_string(),
        }
        .into());
    }

    info!(
        store = store.name(),
        version = %config.dataset.version,
        scenes = store.scene_count(),
        sensors = store.sensors().len(),
        "Sample store opened"
    );
    Ok(store)
}
