//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Neither a dataset root nor the synthetic recording was selected
    #[error("No dataset root: pass --dataroot, set TRUCKSCENES_DATAROOT or dataset.root, or use --synthetic")]
    NoDataset,

    /// The store has nothing to stream
    #[error("Sample store '{store}' contains no scenes")]
    EmptyStore { store: String },
}
