use attribute_abi::AttributeError;
use couplings::CouplingError;
use thiserror::Error;
use update_actions::ScheduleError;
use updater::UpdaterError;

/// Result alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Failures surfaced by the workspace facade.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A component was rejected by the registry.
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    /// Coupling creation or restoration failed.
    #[error(transparent)]
    Coupling(#[from] CouplingError),

    /// A schedule edit was rejected.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// The updater refused a control call.
    #[error(transparent)]
    Updater(#[from] UpdaterError),
}
