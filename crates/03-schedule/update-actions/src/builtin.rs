//! Actions shipped with the scheduler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use attribute_abi::ComponentHandle;
use couplings::Coupling;

use crate::action::{ActionFlow, ActionTarget, TickContext, UpdateAction};

/// Pause used by the delay action offered in the available-action list.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Steps every component in parallel and waits at the barrier.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateAllAction;

impl UpdateAction for UpdateAllAction {
    fn description(&self) -> String {
        "Update all components".to_string()
    }

    fn invoke(&self, ctx: &dyn TickContext) -> ActionFlow {
        ctx.update_all_components();
        ActionFlow::Continue
    }
}

/// Propagates every coupling once.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncCouplingsAction;

impl UpdateAction for SyncCouplingsAction {
    fn description(&self) -> String {
        "Synchronize all couplings".to_string()
    }

    fn invoke(&self, ctx: &dyn TickContext) -> ActionFlow {
        ctx.sync_all_couplings();
        ActionFlow::Continue
    }
}

/// Steps one component on the controlling thread.
#[derive(Clone, Debug)]
pub struct UpdateComponentAction {
    component: ComponentHandle,
}

impl UpdateComponentAction {
    /// Creates an action stepping `component`.
    pub fn new(component: ComponentHandle) -> Self {
        Self { component }
    }

    /// Component stepped by this action.
    pub fn component(&self) -> &ComponentHandle {
        &self.component
    }
}

impl UpdateAction for UpdateComponentAction {
    fn description(&self) -> String {
        format!("Update {}", self.component.name())
    }

    fn invoke(&self, ctx: &dyn TickContext) -> ActionFlow {
        ctx.update_component(&self.component);
        ActionFlow::Continue
    }

    fn target(&self) -> ActionTarget {
        ActionTarget::Component(self.component.id())
    }
}

/// Propagates one coupling.
#[derive(Clone, Debug)]
pub struct UpdateCouplingAction {
    coupling: Arc<Coupling>,
}

impl UpdateCouplingAction {
    /// Creates an action propagating `coupling`.
    pub fn new(coupling: Arc<Coupling>) -> Self {
        Self { coupling }
    }

    /// Coupling propagated by this action.
    pub fn coupling(&self) -> &Arc<Coupling> {
        &self.coupling
    }
}

impl UpdateAction for UpdateCouplingAction {
    fn description(&self) -> String {
        format!("Update coupling {}", self.coupling.label())
    }

    fn invoke(&self, ctx: &dyn TickContext) -> ActionFlow {
        ctx.sync_coupling(&self.coupling);
        ActionFlow::Continue
    }

    fn target(&self) -> ActionTarget {
        ActionTarget::Coupling(self.coupling.id())
    }
}

/// Sleeps between actions, waking early on stop.
#[derive(Clone, Copy, Debug)]
pub struct DelayAction {
    delay: Duration,
}

impl DelayAction {
    /// Creates a delay of `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for DelayAction {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

impl UpdateAction for DelayAction {
    fn description(&self) -> String {
        format!("Delay {} ms", self.delay.as_millis())
    }

    fn invoke(&self, ctx: &dyn TickContext) -> ActionFlow {
        ctx.pause(self.delay);
        ActionFlow::Continue
    }
}

type ActionFn = dyn Fn(&dyn TickContext) -> ActionFlow + Send + Sync;

/// User-defined action backed by a closure.
///
/// ```
/// use update_actions::{ActionFlow, FnAction};
///
/// let budget = std::sync::atomic::AtomicU32::new(3);
/// let action = FnAction::new("Stop after three ticks", move |_| {
///     if budget.fetch_sub(1, std::sync::atomic::Ordering::Relaxed) == 1 {
///         ActionFlow::Terminate
///     } else {
///         ActionFlow::Continue
///     }
/// });
/// # let _ = action;
/// ```
pub struct FnAction {
    description: String,
    target: ActionTarget,
    run: Box<ActionFn>,
}

impl FnAction {
    /// Wraps `run` under `description`.
    pub fn new<F>(description: impl Into<String>, run: F) -> Self
    where
        F: Fn(&dyn TickContext) -> ActionFlow + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            target: ActionTarget::Workspace,
            run: Box::new(run),
        }
    }

    /// Ties the action to `target` so it is dropped together with it.
    pub fn with_target(mut self, target: ActionTarget) -> Self {
        self.target = target;
        self
    }
}

impl UpdateAction for FnAction {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn invoke(&self, ctx: &dyn TickContext) -> ActionFlow {
        (self.run)(ctx)
    }

    fn target(&self) -> ActionTarget {
        self.target
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("description", &self.description)
            .field("target", &self.target)
            .finish()
    }
}
