use std::sync::Arc;
use std::time::Duration;

use attribute_abi::{ComponentHandle, ComponentId};
use couplings::{Coupling, CouplingId};

/// What the executor should do after an action returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionFlow {
    /// Proceed with the next action.
    Continue,
    /// Request a stop; the current tick ends after this action.
    Terminate,
}

/// Workspace entity an action is tied to.
///
/// Actions targeting a component or coupling are dropped from the schedule
/// when that entity is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionTarget {
    /// Not tied to any single entity.
    Workspace,
    /// Tied to one component.
    Component(ComponentId),
    /// Tied to one coupling.
    Coupling(CouplingId),
}

/// Execution surface handed to actions while a tick runs.
pub trait TickContext {
    /// Steps every non-faulted component and waits for all of them.
    fn update_all_components(&self);

    /// Steps a single component on the calling thread.
    fn update_component(&self, component: &ComponentHandle);

    /// Propagates every live coupling.
    fn sync_all_couplings(&self);

    /// Propagates a single coupling.
    fn sync_coupling(&self, coupling: &Coupling);

    /// Returns true once a stop has been requested.
    fn stop_requested(&self) -> bool;

    /// Sleeps for `duration`, returning early if a stop is requested.
    fn pause(&self, duration: Duration);
}

/// One schedulable step of a tick.
pub trait UpdateAction: Send + Sync {
    /// Human-readable description, used for lookup and display.
    fn description(&self) -> String;

    /// Runs the action against the executing tick.
    fn invoke(&self, ctx: &dyn TickContext) -> ActionFlow;

    /// Entity this action belongs to.
    fn target(&self) -> ActionTarget {
        ActionTarget::Workspace
    }
}

/// Shared handle to a scheduled action. Identity is the allocation.
pub type ActionRef = Arc<dyn UpdateAction>;

/// Returns true when both handles point at the same action instance.
pub fn same_action(a: &ActionRef, b: &ActionRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
