use std::any::Any;
use std::collections::BTreeMap;

use attribute_abi::{ComponentHandle, ComponentId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Record of a failed component step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFault {
    /// Failing component.
    pub component: ComponentId,
    /// Component name at the time of the failure.
    pub name: String,
    /// Index of the failing tick among all ticks begun, counted from zero.
    /// Ticks cut short by a stop are included.
    pub tick: u64,
    /// Error or panic message.
    pub message: String,
}

/// Faulted components, skipped by every update until cleared.
#[derive(Default)]
pub(crate) struct FaultRegistry {
    faults: Mutex<BTreeMap<ComponentId, ComponentFault>>,
}

impl FaultRegistry {
    pub(crate) fn record(&self, fault: ComponentFault) {
        self.faults.lock().insert(fault.component, fault);
    }

    pub(crate) fn is_faulted(&self, id: ComponentId) -> bool {
        self.faults.lock().contains_key(&id)
    }

    pub(crate) fn clear(&self, id: ComponentId) -> bool {
        self.faults.lock().remove(&id).is_some()
    }

    pub(crate) fn clear_all(&self) -> Vec<ComponentId> {
        let drained = std::mem::take(&mut *self.faults.lock());
        drained.into_keys().collect()
    }

    pub(crate) fn list(&self) -> Vec<ComponentFault> {
        self.faults.lock().values().cloned().collect()
    }

    /// Forgets faults of components that are no longer registered.
    pub(crate) fn retain_live(&self, live: &[ComponentHandle]) {
        let mut faults = self.faults.lock();
        if faults.is_empty() {
            return;
        }
        faults.retain(|id, _| live.iter().any(|handle| handle.id() == *id));
    }
}

/// Renders a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
