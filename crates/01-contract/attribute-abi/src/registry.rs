//! Copy-on-write component set.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::Receiver;
use log::debug;
use parking_lot::Mutex;

use crate::bus::EventBus;
use crate::component::{Component, ComponentHandle, ComponentId};
use crate::error::{AttributeError, AttributeResult};
use crate::value::{AttributeKey, ContainerId};

/// Lifecycle notifications published by [`ComponentRegistry`].
#[derive(Clone, Debug)]
pub enum ComponentEvent {
    /// A component joined the workspace.
    Added(ComponentHandle),
    /// A component left the workspace.
    Removed(ComponentHandle),
    /// Every listed component left the workspace at once.
    Cleared(Vec<ComponentHandle>),
}

/// Registry of live components.
///
/// Readers take an immutable snapshot; writers build a new vector and swap it
/// in, so a reader on another thread sees either the previous or the current
/// set, never a partially mutated one.
pub struct ComponentRegistry {
    components: ArcSwap<Vec<ComponentHandle>>,
    writer: Mutex<()>,
    next_id: AtomicU64,
    events: EventBus<ComponentEvent>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            components: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            next_id: AtomicU64::new(1),
            events: EventBus::new(),
        }
    }

    /// Subscribes to component lifecycle events.
    pub fn subscribe(&self) -> Receiver<ComponentEvent> {
        self.events.subscribe()
    }

    /// Registers a component and assigns it a fresh id.
    ///
    /// Container ids are unique across the registry: a component exposing a
    /// container id that another registered component (or the component
    /// itself) already exposes is rejected and nothing is published.
    pub fn add(&self, component: Arc<dyn Component>) -> AttributeResult<ComponentHandle> {
        let offered: Vec<ContainerId> = component
            .attribute_containers()
            .iter()
            .map(|container| container.container_id())
            .collect();
        let handle = {
            let _guard = self.writer.lock();
            let current = self.components.load_full();
            let mut claimed: BTreeSet<ContainerId> =
                current.iter().flat_map(|h| h.container_ids()).collect();
            if let Some(clash) = offered.into_iter().find(|id| !claimed.insert(id.clone())) {
                debug!("component {} rejected: container {clash} taken", component.name());
                return Err(AttributeError::DuplicateContainer(clash));
            }
            let id = ComponentId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            let handle = ComponentHandle::new(id, component);
            let mut next = Vec::clone(&current);
            next.push(handle.clone());
            self.components.store(Arc::new(next));
            handle
        };
        debug!("component added id={} name={}", handle.id(), handle.name());
        self.events.publish(ComponentEvent::Added(handle.clone()));
        Ok(handle)
    }

    /// Removes a component. Returns `None` when the id is unknown.
    pub fn remove(&self, id: ComponentId) -> Option<ComponentHandle> {
        let removed = {
            let _guard = self.writer.lock();
            let current = self.components.load_full();
            let pos = current.iter().position(|h| h.id() == id)?;
            let mut next = Vec::clone(&current);
            let removed = next.remove(pos);
            self.components.store(Arc::new(next));
            removed
        };
        debug!("component removed id={} name={}", id, removed.name());
        self.events.publish(ComponentEvent::Removed(removed.clone()));
        Some(removed)
    }

    /// Removes every component, returning them in registration order.
    pub fn clear(&self) -> Vec<ComponentHandle> {
        let removed = {
            let _guard = self.writer.lock();
            let previous = self.components.swap(Arc::new(Vec::new()));
            Vec::clone(&previous)
        };
        if !removed.is_empty() {
            debug!("component registry cleared count={}", removed.len());
            self.events.publish(ComponentEvent::Cleared(removed.clone()));
        }
        removed
    }

    /// Returns the component with `id`, if registered.
    pub fn get(&self, id: ComponentId) -> Option<ComponentHandle> {
        self.components.load().iter().find(|h| h.id() == id).cloned()
    }

    /// Returns the first component whose name matches `name`.
    pub fn find_by_name(&self, name: &str) -> Option<ComponentHandle> {
        self.components
            .load()
            .iter()
            .find(|h| h.name() == name)
            .cloned()
    }

    /// Returns the registered component exposing producer `key`.
    pub fn producer_owner(&self, key: &AttributeKey) -> Option<ComponentId> {
        self.components
            .load()
            .iter()
            .find(|h| h.exposes_producer(key))
            .map(|h| h.id())
    }

    /// Returns the registered component exposing consumer `key`.
    pub fn consumer_owner(&self, key: &AttributeKey) -> Option<ComponentId> {
        self.components
            .load()
            .iter()
            .find(|h| h.exposes_consumer(key))
            .map(|h| h.id())
    }

    /// Returns the current component set.
    pub fn snapshot(&self) -> Arc<Vec<ComponentHandle>> {
        self.components.load_full()
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.components.load().len()
    }

    /// Returns true when no components are registered.
    pub fn is_empty(&self) -> bool {
        self.components.load().is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
