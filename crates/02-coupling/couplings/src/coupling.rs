use std::fmt;

use attribute_abi::{ComponentId, Consumer, ContainerId, Producer, ValueType};

use crate::descriptor::CouplingDescriptor;
use crate::error::{CouplingError, CouplingResult};

/// Manager-assigned identity of a coupling instance.
///
/// Two couplings between the same producer and consumer are distinct
/// instances with distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CouplingId(u64);

impl CouplingId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CouplingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Components exposing each endpoint when the coupling was created.
///
/// `None` marks an endpoint that no registered component exposed, such as a
/// free-standing attribute built in a test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EndpointOwners {
    /// Component exposing the producer.
    pub producer: Option<ComponentId>,
    /// Component exposing the consumer.
    pub consumer: Option<ComponentId>,
}

/// Immutable binding from one producer to one consumer of the same type.
pub struct Coupling {
    id: CouplingId,
    producer: Producer,
    consumer: Consumer,
    owners: EndpointOwners,
}

impl Coupling {
    pub(crate) fn new(
        id: CouplingId,
        producer: Producer,
        consumer: Consumer,
        owners: EndpointOwners,
    ) -> Self {
        debug_assert_eq!(producer.value_type(), consumer.value_type());
        Self {
            id,
            producer,
            consumer,
            owners,
        }
    }

    /// Returns the coupling id.
    pub fn id(&self) -> CouplingId {
        self.id
    }

    /// Returns the bound producer.
    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// Returns the bound consumer.
    pub fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    /// Components that exposed the endpoints at creation.
    pub fn owners(&self) -> EndpointOwners {
        self.owners
    }

    /// Value type shared by both endpoints.
    pub fn value_type(&self) -> ValueType {
        self.producer.value_type()
    }

    /// Returns false when either endpoint has vanished.
    pub fn is_live(&self) -> bool {
        self.producer.is_live() && self.consumer.is_live()
    }

    /// Returns true when either endpoint belongs to one of `owners`.
    pub fn touches(&self, owners: &[ContainerId]) -> bool {
        owners
            .iter()
            .any(|owner| self.producer.owner() == owner || self.consumer.owner() == owner)
    }

    /// Returns true when either endpoint belongs to `component`.
    ///
    /// Endpoints with a recorded owner match on the component id alone, so a
    /// container the component stopped exposing still counts. Endpoints
    /// without one fall back to `containers`.
    pub fn belongs_to(&self, component: ComponentId, containers: &[ContainerId]) -> bool {
        let owned = |recorded: Option<ComponentId>, owner: &ContainerId| match recorded {
            Some(id) => id == component,
            None => containers.contains(owner),
        };
        owned(self.owners.producer, self.producer.owner())
            || owned(self.owners.consumer, self.consumer.owner())
    }

    /// Reads the producer and writes the value into the consumer.
    pub fn propagate(&self) -> CouplingResult<()> {
        let value = self
            .producer
            .read()
            .ok_or_else(|| CouplingError::Vanished(self.producer.key().clone()))?;
        self.consumer.write(value)?;
        Ok(())
    }

    /// Persistable reference to both endpoints.
    pub fn descriptor(&self) -> CouplingDescriptor {
        CouplingDescriptor::new(self.producer.key().clone(), self.consumer.key().clone())
    }

    /// Short `producer > consumer` label.
    pub fn label(&self) -> String {
        format!("{} > {}", self.producer.key(), self.consumer.key())
    }
}

impl fmt::Debug for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coupling")
            .field("id", &self.id)
            .field("producer", self.producer.key())
            .field("consumer", self.consumer.key())
            .field("value_type", &self.value_type())
            .field("owners", &self.owners)
            .finish()
    }
}
