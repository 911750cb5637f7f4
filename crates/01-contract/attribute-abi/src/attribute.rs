//! Typed producer and consumer descriptors.
//!
//! Both descriptors are type-erased at rest so heterogeneous couplings can be
//! stored together, but they are always built from a concrete `T` and record
//! its [`ValueType`]. An *anchored* attribute holds its backing state weakly:
//! once the component drops that state (an entity removed from a world, say)
//! the attribute reports itself as no longer live.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{AttributeError, AttributeResult};
use crate::value::{AttributeKey, AttributeValue, ContainerId, ValueType};

type ReadFn = dyn Fn() -> Option<AttributeValue> + Send + Sync;
type WriteFn = dyn Fn(AttributeValue) -> AttributeResult<()> + Send + Sync;

#[derive(Clone)]
enum Anchor {
    Static,
    State(Weak<dyn Any + Send + Sync>),
}

impl Anchor {
    fn of<S: Any + Send + Sync>(state: &Arc<S>) -> Self {
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(state) as Arc<dyn Any + Send + Sync>;
        Anchor::State(Arc::downgrade(&erased))
    }

    fn is_live(&self) -> bool {
        match self {
            Anchor::Static => true,
            Anchor::State(state) => state.strong_count() > 0,
        }
    }
}

/// Readable, typed attribute exposed by a component.
#[derive(Clone)]
pub struct Producer {
    key: AttributeKey,
    value_type: ValueType,
    description: Arc<str>,
    read: Arc<ReadFn>,
    anchor: Anchor,
}

impl Producer {
    /// Creates a producer backed by a free-standing closure. It is always live.
    pub fn new<T, F>(
        owner: impl Into<ContainerId>,
        id: impl Into<String>,
        description: impl Into<String>,
        read: F,
    ) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            key: AttributeKey::new(owner, id),
            value_type: ValueType::of::<T>(),
            description: Arc::from(description.into()),
            read: Arc::new(move || Some(Box::new(read()) as AttributeValue)),
            anchor: Anchor::Static,
        }
    }

    /// Creates a producer reading from `state`, live only while `state` is.
    pub fn anchored<S, T, F>(
        owner: impl Into<ContainerId>,
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
        let weak = Arc::downgrade(state);
        Self {
            key: AttributeKey::new(owner, id),
            value_type: ValueType::of::<T>(),
            description: Arc::from(description.into()),
            read: Arc::new(move || {
                weak.upgrade()
                    .map(|state| Box::new(read(&*state)) as AttributeValue)
            }),
            anchor: Anchor::of(state),
        }
    }

    /// Returns the producer's identity.
    pub fn key(&self) -> &AttributeKey {
        &self.key
    }

    /// Returns the container that owns this producer.
    pub fn owner(&self) -> &ContainerId {
        &self.key.owner
    }

    /// Returns the declared value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns false once the backing state has been dropped.
    pub fn is_live(&self) -> bool {
        self.anchor.is_live()
    }

    /// Reads the current value, or `None` if the producer has vanished.
    pub fn read(&self) -> Option<AttributeValue> {
        (self.read)()
    }

    /// Reads the current value as `T`.
    pub fn read_as<T: Any>(&self) -> Option<T> {
        self.read()?.downcast::<T>().ok().map(|value| *value)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("key", &self.key)
            .field("value_type", &self.value_type)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Writable, typed attribute exposed by a component.
#[derive(Clone)]
pub struct Consumer {
    key: AttributeKey,
    value_type: ValueType,
    description: Arc<str>,
    write: Arc<WriteFn>,
    anchor: Anchor,
}

impl Consumer {
    /// Creates a consumer backed by a free-standing closure. It is always live.
    pub fn new<T, F>(
        owner: impl Into<ContainerId>,
        id: impl Into<String>,
        description: impl Into<String>,
        write: F,
    ) -> Self
    where
        T: Any + Send,
        F: Fn(T) + Send + Sync + 'static,
    {
        let key = AttributeKey::new(owner, id);
        let err_key = key.clone();
        Self {
            key,
            value_type: ValueType::of::<T>(),
            description: Arc::from(description.into()),
            write: Arc::new(move |value: AttributeValue| {
                let value = downcast::<T>(value, &err_key)?;
                write(value);
                Ok(())
            }),
            anchor: Anchor::Static,
        }
    }

    /// Creates a consumer writing into `state`, live only while `state` is.
    pub fn anchored<S, T, F>(
        owner: impl Into<ContainerId>,
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
        let key = AttributeKey::new(owner, id);
        let err_key = key.clone();
        let weak = Arc::downgrade(state);
        Self {
            key,
            value_type: ValueType::of::<T>(),
            description: Arc::from(description.into()),
            write: Arc::new(move |value: AttributeValue| {
                let state = weak
                    .upgrade()
                    .ok_or_else(|| AttributeError::Vanished(err_key.clone()))?;
                let value = downcast::<T>(value, &err_key)?;
                write(&*state, value);
                Ok(())
            }),
            anchor: Anchor::of(state),
        }
    }

    /// Returns the consumer's identity.
    pub fn key(&self) -> &AttributeKey {
        &self.key
    }

    /// Returns the container that owns this consumer.
    pub fn owner(&self) -> &ContainerId {
        &self.key.owner
    }

    /// Returns the declared value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns false once the backing state has been dropped.
    pub fn is_live(&self) -> bool {
        self.anchor.is_live()
    }

    /// Writes a type-erased value.
    pub fn write(&self, value: AttributeValue) -> AttributeResult<()> {
        (self.write)(value)
    }

    /// Writes a typed value.
    pub fn write_value<T: Any + Send>(&self, value: T) -> AttributeResult<()> {
        self.write(Box::new(value))
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("value_type", &self.value_type)
            .field("live", &self.is_live())
            .finish()
    }
}

fn downcast<T: Any>(value: AttributeValue, key: &AttributeKey) -> AttributeResult<T> {
    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| AttributeError::WrongType {
            key: key.clone(),
            expected: ValueType::of::<T>(),
        })
}
