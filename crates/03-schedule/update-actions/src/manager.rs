use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use attribute_abi::{ComponentEvent, ComponentHandle, ComponentId, EventBus};
use couplings::{Coupling, CouplingEvent, CouplingId};
use crossbeam_channel::Receiver;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::action::{same_action, ActionRef, ActionTarget};
use crate::builtin::{
    DelayAction, SyncCouplingsAction, UpdateAllAction, UpdateComponentAction,
    UpdateCouplingAction,
};
use crate::error::{ScheduleError, ScheduleResult};

/// Notifications published when the action list changes.
#[derive(Clone)]
pub enum ActionEvent {
    /// An action was appended.
    Added(ActionRef),
    /// An action left the list.
    Removed(ActionRef),
    /// Two entries swapped places.
    OrderChanged,
}

impl std::fmt::Debug for ActionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionEvent::Added(action) => {
                f.debug_tuple("Added").field(&action.description()).finish()
            }
            ActionEvent::Removed(action) => {
                f.debug_tuple("Removed").field(&action.description()).finish()
            }
            ActionEvent::OrderChanged => f.write_str("OrderChanged"),
        }
    }
}

/// Generated actions remembered per live component and coupling.
#[derive(Default)]
struct Generated {
    components: BTreeMap<ComponentId, Arc<UpdateComponentAction>>,
    couplings: BTreeMap<CouplingId, Arc<UpdateCouplingAction>>,
}

/// Owner of the ordered per-tick action list.
pub struct UpdateActionManager {
    actions: ArcSwap<Vec<ActionRef>>,
    writer: Mutex<Generated>,
    component_events: Receiver<ComponentEvent>,
    coupling_events: Receiver<CouplingEvent>,
    events: EventBus<ActionEvent>,
}

impl UpdateActionManager {
    /// Creates a manager following the given lifecycle streams, with the
    /// default schedule installed.
    pub fn new(
        component_events: Receiver<ComponentEvent>,
        coupling_events: Receiver<CouplingEvent>,
    ) -> Self {
        let manager = Self {
            actions: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(Generated::default()),
            component_events,
            coupling_events,
            events: EventBus::new(),
        };
        manager.set_default_update_actions();
        manager
    }

    /// Subscribes to action list changes.
    pub fn subscribe(&self) -> Receiver<ActionEvent> {
        self.events.subscribe()
    }

    /// Applies pending component and coupling lifecycle events now: remembers
    /// generated actions for new entities and drops scheduled actions whose
    /// target is gone, publishing [`ActionEvent::Removed`] for each.
    pub fn sync_lifecycle(&self) {
        let mut generated = self.writer.lock();
        self.absorb(&mut generated);
    }

    /// The list to execute for one tick.
    pub fn snapshot(&self) -> Arc<Vec<ActionRef>> {
        if !self.component_events.is_empty() || !self.coupling_events.is_empty() {
            let mut generated = self.writer.lock();
            self.absorb(&mut generated);
        }
        self.actions.load_full()
    }

    /// Number of scheduled actions.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns true when nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `action` to the end of the list.
    pub fn add_action(&self, action: ActionRef) {
        {
            let mut generated = self.writer.lock();
            self.absorb(&mut generated);
            let mut next = Vec::clone(&self.actions.load());
            next.push(Arc::clone(&action));
            self.actions.store(Arc::new(next));
        }
        debug!("action added: {}", action.description());
        self.events.publish(ActionEvent::Added(action));
    }

    /// Removes `action`. Returns false when it is not scheduled.
    pub fn remove_action(&self, action: &ActionRef) -> bool {
        let removed = {
            let mut generated = self.writer.lock();
            self.absorb(&mut generated);
            let current = self.actions.load_full();
            let Some(pos) = current.iter().position(|a| same_action(a, action)) else {
                return false;
            };
            let mut next = Vec::clone(&current);
            let removed = next.remove(pos);
            self.actions.store(Arc::new(next));
            removed
        };
        debug!("action removed: {}", removed.description());
        self.events.publish(ActionEvent::Removed(removed));
        true
    }

    /// Swaps the entries at positions `i` and `j`.
    pub fn swap_elements(&self, i: usize, j: usize) -> ScheduleResult<()> {
        {
            let mut generated = self.writer.lock();
            self.absorb(&mut generated);
            let current = self.actions.load_full();
            let len = current.len();
            if let Some(index) = [i, j].into_iter().find(|&index| index >= len) {
                return Err(ScheduleError::IndexOutOfRange { index, len });
            }
            if i == j {
                return Ok(());
            }
            let mut next = Vec::clone(&current);
            next.swap(i, j);
            self.actions.store(Arc::new(next));
        }
        trace!("actions {i} and {j} swapped");
        self.events.publish(ActionEvent::OrderChanged);
        Ok(())
    }

    /// Removes every scheduled action.
    pub fn clear(&self) {
        let removed = {
            let mut generated = self.writer.lock();
            self.absorb(&mut generated);
            self.actions.swap(Arc::new(Vec::new()))
        };
        for action in removed.iter() {
            self.events.publish(ActionEvent::Removed(Arc::clone(action)));
        }
    }

    /// Replaces the list with update-all followed by sync-all.
    pub fn set_default_update_actions(&self) {
        let defaults: Vec<ActionRef> =
            vec![Arc::new(UpdateAllAction), Arc::new(SyncCouplingsAction)];
        let removed = {
            let mut generated = self.writer.lock();
            self.absorb(&mut generated);
            self.actions.swap(Arc::new(defaults.clone()))
        };
        debug!("default update actions installed");
        for action in removed.iter() {
            self.events.publish(ActionEvent::Removed(Arc::clone(action)));
        }
        for action in defaults {
            self.events.publish(ActionEvent::Added(action));
        }
    }

    /// Generated action stepping component `id`, if that component is live.
    pub fn component_action(&self, id: ComponentId) -> Option<ActionRef> {
        let mut generated = self.writer.lock();
        self.absorb(&mut generated);
        generated
            .components
            .get(&id)
            .map(|action| Arc::clone(action) as ActionRef)
    }

    /// Generated action propagating coupling `id`, if that coupling is live.
    pub fn coupling_action(&self, id: CouplingId) -> Option<ActionRef> {
        let mut generated = self.writer.lock();
        self.absorb(&mut generated);
        generated
            .couplings
            .get(&id)
            .map(|action| Arc::clone(action) as ActionRef)
    }

    /// Fresh instances of every action that could be scheduled now.
    pub fn available_actions(&self) -> Vec<ActionRef> {
        let mut generated = self.writer.lock();
        self.absorb(&mut generated);

        let mut available: Vec<ActionRef> =
            vec![Arc::new(UpdateAllAction), Arc::new(DelayAction::default())];
        available.extend(generated.components.values().map(|action| {
            Arc::new(UpdateComponentAction::new(action.component().clone())) as ActionRef
        }));
        available.extend(generated.couplings.values().map(|action| {
            Arc::new(UpdateCouplingAction::new(Arc::clone(action.coupling()))) as ActionRef
        }));
        available
    }

    /// Available action whose description matches `description`, ignoring
    /// case.
    pub fn find_available(&self, description: &str) -> Option<ActionRef> {
        let wanted = description.to_lowercase();
        self.available_actions()
            .into_iter()
            .find(|action| action.description().to_lowercase() == wanted)
    }

    fn absorb(&self, generated: &mut Generated) {
        let mut gone: Vec<ActionTarget> = Vec::new();

        for event in self.component_events.try_iter() {
            match event {
                ComponentEvent::Added(handle) => remember_component(generated, handle),
                ComponentEvent::Removed(handle) => {
                    generated.components.remove(&handle.id());
                    gone.push(ActionTarget::Component(handle.id()));
                }
                ComponentEvent::Cleared(handles) => {
                    for handle in handles {
                        generated.components.remove(&handle.id());
                        gone.push(ActionTarget::Component(handle.id()));
                    }
                }
            }
        }

        for event in self.coupling_events.try_iter() {
            match event {
                CouplingEvent::Added(coupling) => remember_coupling(generated, coupling),
                CouplingEvent::Removed(coupling) => {
                    generated.couplings.remove(&coupling.id());
                    gone.push(ActionTarget::Coupling(coupling.id()));
                }
                CouplingEvent::BulkRemoved(list) => {
                    for coupling in list {
                        generated.couplings.remove(&coupling.id());
                        gone.push(ActionTarget::Coupling(coupling.id()));
                    }
                }
            }
        }

        if gone.is_empty() {
            return;
        }
        let current = self.actions.load_full();
        let (dropped, kept): (Vec<ActionRef>, Vec<ActionRef>) = current
            .iter()
            .cloned()
            .partition(|action| gone.contains(&action.target()));
        if dropped.is_empty() {
            return;
        }
        self.actions.store(Arc::new(kept));
        for action in dropped {
            debug!("action dropped with its target: {}", action.description());
            self.events.publish(ActionEvent::Removed(action));
        }
    }
}

fn remember_component(generated: &mut Generated, handle: ComponentHandle) {
    trace!("generated update action for component {}", handle.id());
    generated
        .components
        .insert(handle.id(), Arc::new(UpdateComponentAction::new(handle)));
}

fn remember_coupling(generated: &mut Generated, coupling: Arc<Coupling>) {
    trace!("generated update action for coupling {}", coupling.id());
    generated
        .couplings
        .insert(coupling.id(), Arc::new(UpdateCouplingAction::new(coupling)));
}
