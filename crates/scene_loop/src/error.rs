//! Scene loop errors

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneLoopError {
    /// The loop task has exited; its handle is stale
    #[error("scene loop is not running")]
    Stopped,

    #[error(transparent)]
    Contract(#[from] ContractError),
}
