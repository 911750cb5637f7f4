//! Mock components with simple numeric state, used by integration tests and
//! demos to drive a workspace without a real simulation behind it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::bail;
use attribute_abi::{AttributeContainer, AttributeKey, AttributeTable, Component, Producer};
use log::trace;
use parking_lot::Mutex;
use workspace::{Workspace, WorkspaceResult};

/// Creates a workspace with `workers` update-all threads.
pub fn make_workspace(workers: usize) -> WorkspaceResult<Workspace> {
    Workspace::builder().worker_threads(workers).build()
}

/// Emits a value that advances by `step` on every update.
pub struct Source {
    name: String,
    value: Arc<Mutex<f64>>,
    step: f64,
    table: Arc<AttributeTable>,
}

impl Source {
    /// Creates a source holding `value` that never changes on its own.
    pub fn constant(name: &str, value: f64) -> Arc<Self> {
        Self::ramp(name, value, 0.0)
    }

    /// Creates a source starting at `start` and adding `step` per update.
    pub fn ramp(name: &str, start: f64, step: f64) -> Arc<Self> {
        let value = Arc::new(Mutex::new(start));
        let table = AttributeTable::new(name).produces(
            "value",
            "Current output",
            &value,
            |v: &Mutex<f64>| *v.lock(),
        );
        Arc::new(Self {
            name: name.to_string(),
            value,
            step,
            table: Arc::new(table),
        })
    }

    /// Key of the `value` producer.
    pub fn output(&self) -> AttributeKey {
        AttributeKey::new(self.name.as_str(), "value")
    }

    /// Overwrites the current value.
    pub fn set(&self, value: f64) {
        *self.value.lock() = value;
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        *self.value.lock()
    }
}

impl Component for Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self) -> anyhow::Result<()> {
        *self.value.lock() += self.step;
        Ok(())
    }

    fn attribute_containers(&self) -> Vec<Arc<dyn AttributeContainer>> {
        vec![Arc::clone(&self.table) as Arc<dyn AttributeContainer>]
    }
}

#[derive(Default)]
struct RecorderState {
    input: f64,
    observed: Vec<f64>,
}

/// Records the value of its `input` consumer at every update.
pub struct Recorder {
    name: String,
    state: Arc<Mutex<RecorderState>>,
    table: Arc<AttributeTable>,
}

impl Recorder {
    /// Creates a recorder whose input starts at zero.
    pub fn new(name: &str) -> Arc<Self> {
        let state = Arc::new(Mutex::new(RecorderState::default()));
        let table = AttributeTable::new(name)
            .consumes(
                "input",
                "Observed input",
                &state,
                |s: &Mutex<RecorderState>, v: f64| s.lock().input = v,
            )
            .produces("last", "Last observed input", &state, |s: &Mutex<RecorderState>| {
                s.lock().observed.last().copied().unwrap_or_default()
            });
        Arc::new(Self {
            name: name.to_string(),
            state,
            table: Arc::new(table),
        })
    }

    /// Key of the `input` consumer.
    pub fn input(&self) -> AttributeKey {
        AttributeKey::new(self.name.as_str(), "input")
    }

    /// Key of the `last` producer.
    pub fn last(&self) -> AttributeKey {
        AttributeKey::new(self.name.as_str(), "last")
    }

    /// Inputs seen by each update so far.
    pub fn observed(&self) -> Vec<f64> {
        self.state.lock().observed.clone()
    }
}

impl Component for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let input = state.input;
        state.observed.push(input);
        trace!("{} observed {input}", self.name);
        Ok(())
    }

    fn attribute_containers(&self) -> Vec<Arc<dyn AttributeContainer>> {
        vec![Arc::clone(&self.table) as Arc<dyn AttributeContainer>]
    }
}

#[derive(Default)]
struct LeakyState {
    x: f64,
    input: f64,
}

/// Deterministic first-order filter: `x' = decay * x + drive + input`, where
/// `input` is the last value written to its `input` consumer.
pub struct Leaky {
    name: String,
    state: Arc<Mutex<LeakyState>>,
    decay: f64,
    drive: f64,
    table: Arc<AttributeTable>,
}

impl Leaky {
    /// Creates a filter at zero.
    pub fn new(name: &str, decay: f64, drive: f64) -> Arc<Self> {
        let state = Arc::new(Mutex::new(LeakyState::default()));
        let table = AttributeTable::new(name)
            .produces("x", "Filter state", &state, |s: &Mutex<LeakyState>| s.lock().x)
            .consumes("input", "Added input", &state, |s: &Mutex<LeakyState>, v: f64| {
                s.lock().input = v
            });
        Arc::new(Self {
            name: name.to_string(),
            state,
            decay,
            drive,
            table: Arc::new(table),
        })
    }

    /// Key of the `x` producer.
    pub fn output(&self) -> AttributeKey {
        AttributeKey::new(self.name.as_str(), "x")
    }

    /// Key of the `input` consumer.
    pub fn input(&self) -> AttributeKey {
        AttributeKey::new(self.name.as_str(), "input")
    }

    /// Current state.
    pub fn value(&self) -> f64 {
        self.state.lock().x
    }
}

impl Component for Leaky {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.x = self.decay * state.x + self.drive + state.input;
        Ok(())
    }

    fn attribute_containers(&self) -> Vec<Arc<dyn AttributeContainer>> {
        vec![Arc::clone(&self.table) as Arc<dyn AttributeContainer>]
    }
}

/// Named entities that move by one unit per update. Each entity is its own
/// container, `<world>/<entity>`, with an `x` producer, and disappears from
/// [`Component::attribute_containers`] once despawned.
pub struct World {
    name: String,
    entities: Arc<Mutex<BTreeMap<String, f64>>>,
}

impl World {
    /// Creates an empty world.
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            entities: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    /// Adds or moves `entity` to `x`.
    pub fn spawn(&self, entity: &str, x: f64) {
        self.entities.lock().insert(entity.to_string(), x);
    }

    /// Removes `entity`. Returns false when it did not exist.
    pub fn despawn(&self, entity: &str) -> bool {
        self.entities.lock().remove(entity).is_some()
    }

    /// Key of `entity`'s `x` producer.
    pub fn position(&self, entity: &str) -> AttributeKey {
        AttributeKey::new(self.container_id(entity), "x")
    }

    fn container_id(&self, entity: &str) -> String {
        format!("{}/{entity}", self.name)
    }
}

impl Component for World {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self) -> anyhow::Result<()> {
        for x in self.entities.lock().values_mut() {
            *x += 1.0;
        }
        Ok(())
    }

    fn attribute_containers(&self) -> Vec<Arc<dyn AttributeContainer>> {
        let names: Vec<String> = self.entities.lock().keys().cloned().collect();
        names
            .into_iter()
            .map(|entity| {
                let id = self.container_id(&entity);
                let entities = Arc::clone(&self.entities);
                let producer = Producer::new(id.clone(), "x", "Entity position", move || {
                    entities.lock().get(&entity).copied().unwrap_or_default()
                });
                Arc::new(AttributeTable::new(id).with_producer(producer))
                    as Arc<dyn AttributeContainer>
            })
            .collect()
    }
}

/// How a [`Faulty`] component fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    /// `update` returns an error.
    Error,
    /// `update` panics.
    Panic,
}

/// Fails on one chosen update and succeeds on all others.
pub struct Faulty {
    name: String,
    fail_on: u64,
    mode: FailureMode,
    calls: AtomicU64,
}

impl Faulty {
    /// Creates a component that fails on its `fail_on`-th update (1-based).
    pub fn new(name: &str, fail_on: u64, mode: FailureMode) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_on,
            mode,
            calls: AtomicU64::new(0),
        })
    }

    /// Number of times `update` was entered.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Component for Faulty {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            match self.mode {
                FailureMode::Error => bail!("{} failed on update {call}", self.name),
                FailureMode::Panic => panic!("{} panicked on update {call}", self.name),
            }
        }
        Ok(())
    }

    fn attribute_containers(&self) -> Vec<Arc<dyn AttributeContainer>> {
        Vec::new()
    }
}
