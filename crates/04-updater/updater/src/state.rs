use attribute_abi::ComponentId;
use serde::{Deserialize, Serialize};

use crate::fault::ComponentFault;

/// Lifecycle of the tick executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdaterState {
    /// No tick is executing.
    Idle,
    /// The run loop thread is executing ticks.
    Running,
    /// A bounded number of ticks is executing on the caller's thread.
    SteppingOnce,
    /// A stop was requested; the current action is finishing.
    Stopping,
}

impl UpdaterState {
    /// Returns true while ticks are executing or winding down.
    pub fn is_active(self) -> bool {
        !matches!(self, UpdaterState::Idle)
    }
}

/// Notifications published by the updater.
#[derive(Clone, Debug)]
pub enum UpdaterEvent {
    /// The updater moved to a new state.
    StateChanged(UpdaterState),
    /// A component step failed and the component is now skipped.
    ComponentFaulted(ComponentFault),
    /// A faulted component was re-enabled.
    FaultCleared(ComponentId),
    /// A tick ran every scheduled action; carries the new tick count.
    TickCompleted(u64),
    /// A scheduled action panicked; the tick went on with the next action.
    ActionFailed {
        /// Description of the failing action.
        action: String,
        /// Index of the tick among all ticks begun, counted from zero.
        tick: u64,
        /// Panic message.
        message: String,
    },
}
