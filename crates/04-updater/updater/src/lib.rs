#![deny(missing_docs)]
//! Tick executor for a workspace.
//!
//! [`WorkspaceUpdater`] reads one action snapshot per tick and runs it on a
//! controlling thread. Update-all fans component steps out to a bounded
//! worker pool and waits at a barrier before the next action, so couplings
//! synchronized afterwards see a consistent post-step state.

mod config;
mod error;
mod fault;
mod pool;
mod state;
mod updater;

pub use config::UpdaterConfig;
pub use error::{UpdaterError, UpdaterResult};
pub use fault::ComponentFault;
pub use state::{UpdaterEvent, UpdaterState};
pub use updater::WorkspaceUpdater;
