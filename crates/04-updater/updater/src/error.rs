use std::io;

use thiserror::Error;

use crate::state::UpdaterState;

/// Result alias for updater control calls.
pub type UpdaterResult<T> = Result<T, UpdaterError>;

/// Failures raised by updater control calls.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// The updater is not idle.
    #[error("updater is busy ({0:?})")]
    Busy(UpdaterState),

    /// A worker or run-loop thread could not be started.
    #[error("failed to spawn updater thread: {0}")]
    Spawn(#[from] io::Error),
}
