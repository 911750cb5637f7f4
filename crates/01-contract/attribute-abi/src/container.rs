//! Attribute containers and the explicit registration table.

use std::any::Any;
use std::sync::Arc;

use crate::attribute::{Consumer, Producer};
use crate::value::ContainerId;

/// Anything that exposes producers and consumers.
///
/// The returned sets may change over the container's life; callers must not
/// cache them across ticks.
pub trait AttributeContainer: Send + Sync {
    /// Stable identity of the container.
    fn container_id(&self) -> ContainerId;

    /// Producers currently exposed.
    fn producers(&self) -> Vec<Producer>;

    /// Consumers currently exposed.
    fn consumers(&self) -> Vec<Consumer>;

    /// Looks up a producer by attribute id.
    fn producer(&self, id: &str) -> Option<Producer> {
        self.producers().into_iter().find(|p| p.key().id == id)
    }

    /// Looks up a consumer by attribute id.
    fn consumer(&self, id: &str) -> Option<Consumer> {
        self.consumers().into_iter().find(|c| c.key().id == id)
    }
}

/// Static descriptor table listing a container's producers and consumers.
///
/// Components build one of these at construction time instead of relying on
/// any form of runtime introspection.
#[derive(Clone, Debug)]
pub struct AttributeTable {
    id: ContainerId,
    producers: Vec<Producer>,
    consumers: Vec<Consumer>,
}

impl AttributeTable {
    /// Creates an empty table for the given container.
    pub fn new(id: impl Into<ContainerId>) -> Self {
        Self {
            id: id.into(),
            producers: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// Adds a pre-built producer.
    pub fn with_producer(mut self, producer: Producer) -> Self {
        self.producers.push(producer);
        self
    }

    /// Adds a pre-built consumer.
    pub fn with_consumer(mut self, consumer: Consumer) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// Registers a producer reading from `state`, owned by this table.
    pub fn produces<S, T, F>(
        self,
        id: impl Into<String>,
        description: impl Into<String>,
        state: &Arc<S>,
        read: F,
    ) -> Self
    where
        S: Any + Send + Sync,
        T: Any + Send,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let producer = Producer::anchored(self.id.clone(), id, description, state, read);
        self.with_producer(producer)
    }

    /// Registers a consumer writing into `state`, owned by this table.
    pub fn consumes<S, T, F>(
        self,
        id: impl Into<String>,
        description: impl Into<String>,
        state: &Arc<S>,
        write: F,
    ) -> Self
    where
        S: Any + Send + Sync,
        T: Any + Send,
        F: Fn(&S, T) + Send + Sync + 'static,
    {
        let consumer = Consumer::anchored(self.id.clone(), id, description, state, write);
        self.with_consumer(consumer)
    }

    /// Returns the table's container id.
    pub fn id(&self) -> &ContainerId {
        &self.id
    }
}

impl AttributeContainer for AttributeTable {
    fn container_id(&self) -> ContainerId {
        self.id.clone()
    }

    fn producers(&self) -> Vec<Producer> {
        self.producers.clone()
    }

    fn consumers(&self) -> Vec<Consumer> {
        self.consumers.clone()
    }
}
