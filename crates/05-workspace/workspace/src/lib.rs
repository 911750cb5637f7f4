#![deny(missing_docs)]
//! A workspace ties the component registry, coupling manager, update action
//! manager and updater together behind one facade.
//!
//! ```no_run
//! use workspace::Workspace;
//!
//! let workspace = Workspace::builder().worker_threads(4).build()?;
//! workspace.run_once()?;
//! # Ok::<(), workspace::WorkspaceError>(())
//! ```

mod error;
mod workspace;

pub use error::{WorkspaceError, WorkspaceResult};
pub use workspace::{Workspace, WorkspaceBuilder};

pub use attribute_abi as contract;
pub use couplings;
pub use update_actions;
pub use updater;
