//! Type-checked producer → consumer bindings and the registry that owns them.
//!
//! A [`Coupling`] is created only through [`CouplingManager::create`], which
//! checks value types once; afterwards the binding is immutable. The manager
//! publishes [`CouplingEvent`]s so schedules and outer layers can follow
//! additions and removals without holding references into the manager.
#![deny(missing_docs)]

mod coupling;
mod descriptor;
mod error;
mod manager;

pub use coupling::{Coupling, CouplingId, EndpointOwners};
pub use descriptor::{AttributeLookup, CouplingDescriptor};
pub use error::{CouplingError, CouplingResult};
pub use manager::{CouplingEvent, CouplingManager, SyncReport};
