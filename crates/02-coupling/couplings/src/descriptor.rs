//! Persistence-facing view of couplings.
//!
//! The persistence collaborator stores couplings as plain tuples of container
//! and attribute ids and rebuilds them once the components themselves have
//! been restored.

use attribute_abi::{AttributeKey, Consumer, ContainerId, Producer};
use serde::{Deserialize, Serialize};

/// `(producerOwnerId, producerAttrId, consumerOwnerId, consumerAttrId)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouplingDescriptor {
    /// Container exposing the producer.
    pub producer_owner: ContainerId,
    /// Producer attribute id.
    pub producer_id: String,
    /// Container exposing the consumer.
    pub consumer_owner: ContainerId,
    /// Consumer attribute id.
    pub consumer_id: String,
}

impl CouplingDescriptor {
    /// Builds a descriptor from two attribute keys.
    pub fn new(producer: AttributeKey, consumer: AttributeKey) -> Self {
        Self {
            producer_owner: producer.owner,
            producer_id: producer.id,
            consumer_owner: consumer.owner,
            consumer_id: consumer.id,
        }
    }

    /// Key of the producer endpoint.
    pub fn producer_key(&self) -> AttributeKey {
        AttributeKey::new(self.producer_owner.clone(), self.producer_id.clone())
    }

    /// Key of the consumer endpoint.
    pub fn consumer_key(&self) -> AttributeKey {
        AttributeKey::new(self.consumer_owner.clone(), self.consumer_id.clone())
    }
}

/// Resolves persisted attribute keys against live components.
pub trait AttributeLookup {
    /// Finds the producer with `key`.
    fn find_producer(&self, key: &AttributeKey) -> Option<Producer>;

    /// Finds the consumer with `key`.
    fn find_consumer(&self, key: &AttributeKey) -> Option<Consumer>;
}
