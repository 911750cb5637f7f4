//! Steppable component contract.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::container::AttributeContainer;
use crate::value::{AttributeKey, ContainerId};

/// A steppable simulation component.
///
/// Components are shared between the workspace, the schedule, and worker
/// threads, so `update` takes `&self`; implementations keep their mutable
/// state behind interior mutability. During a default tick a component must
/// only read its consumers' values and write its producers' values.
pub trait Component: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Advances the component by one step.
    fn update(&self) -> anyhow::Result<()>;

    /// Attribute containers currently exposed by the component.
    fn attribute_containers(&self) -> Vec<Arc<dyn AttributeContainer>>;
}

/// Workspace-assigned component identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered component together with its id.
#[derive(Clone)]
pub struct ComponentHandle {
    id: ComponentId,
    component: Arc<dyn Component>,
}

impl ComponentHandle {
    /// Pairs a component with its id.
    pub fn new(id: ComponentId, component: Arc<dyn Component>) -> Self {
        Self { id, component }
    }

    /// Returns the component id.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns the component's display name.
    pub fn name(&self) -> &str {
        self.component.name()
    }

    /// Returns the shared component.
    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    /// Steps the component once.
    pub fn update(&self) -> anyhow::Result<()> {
        self.component.update()
    }

    /// Ids of the containers the component currently exposes.
    pub fn container_ids(&self) -> Vec<ContainerId> {
        self.component
            .attribute_containers()
            .iter()
            .map(|container| container.container_id())
            .collect()
    }

    /// Returns true when a container the component exposes right now offers
    /// the producer `key`.
    pub fn exposes_producer(&self, key: &AttributeKey) -> bool {
        self.container(&key.owner)
            .is_some_and(|container| container.producer(&key.id).is_some())
    }

    /// Returns true when a container the component exposes right now offers
    /// the consumer `key`.
    pub fn exposes_consumer(&self, key: &AttributeKey) -> bool {
        self.container(&key.owner)
            .is_some_and(|container| container.consumer(&key.id).is_some())
    }

    fn container(&self, id: &ContainerId) -> Option<Arc<dyn AttributeContainer>> {
        self.component
            .attribute_containers()
            .into_iter()
            .find(|container| &container.container_id() == id)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
