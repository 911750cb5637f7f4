#![deny(missing_docs)]
//! Attribute contract shared between components, couplings, and the scheduler.
//!
//! This crate defines the protocol boundary every steppable component
//! implements: typed producers and consumers grouped into attribute
//! containers, the [`Component`] trait, and the copy-on-write
//! [`ComponentRegistry`] the workspace stores components in. It has no
//! knowledge of couplings or schedules.

mod attribute;
mod bus;
mod component;
mod container;
mod error;
mod registry;
mod value;

pub use attribute::{Consumer, Producer};
pub use bus::EventBus;
pub use component::{Component, ComponentHandle, ComponentId};
pub use container::{AttributeContainer, AttributeTable};
pub use error::{AttributeError, AttributeResult};
pub use registry::{ComponentEvent, ComponentRegistry};
pub use value::{AttributeKey, AttributeValue, ContainerId, ValueType};
