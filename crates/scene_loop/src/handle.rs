//! SceneLoopHandle - control surface of a running scene loop

use contracts::{ContractError, SceneSelector, SceneSummary};
use tokio::sync::{mpsc, oneshot};

use crate::error::SceneLoopError;

/// Command sent to the loop task; handled between ticks
#[derive(Debug)]
pub(crate) enum LoopCommand {
    ChangeScene {
        selector: SceneSelector,
        reply: oneshot::Sender<Result<SceneSummary, ContractError>>,
    },
    Stop,
}

/// Cloneable handle to a scene loop
#[derive(Debug, Clone)]
pub struct SceneLoopHandle {
    tx: mpsc::UnboundedSender<LoopCommand>,
}

impl SceneLoopHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<LoopCommand>) -> Self {
        Self { tx }
    }

    /// Switch to another scene.
    ///
    /// Resolves once the loop has loaded (or failed to load) the scene. On
    /// failure the previous scene keeps streaming.
    pub async fn change_scene(
        &self,
        selector: SceneSelector,
    ) -> Result<SceneSummary, SceneLoopError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LoopCommand::ChangeScene { selector, reply })
            .map_err(|_| SceneLoopError::Stopped)?;
        let result = rx.await.map_err(|_| SceneLoopError::Stopped)?;
        Ok(result?)
    }

    /// Ask the loop to stop; returns false if it already has
    pub fn stop(&self) -> bool {
        self.tx.send(LoopCommand::Stop).is_ok()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
