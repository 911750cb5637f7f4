use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use attribute_abi::{ComponentId, ComponentRegistry, Consumer, ContainerId, EventBus, Producer};
use crossbeam_channel::Receiver;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::coupling::{Coupling, CouplingId, EndpointOwners};
use crate::descriptor::{AttributeLookup, CouplingDescriptor};
use crate::error::{CouplingError, CouplingResult};

/// Lifecycle notifications published by [`CouplingManager`].
#[derive(Clone, Debug)]
pub enum CouplingEvent {
    /// A coupling was registered.
    Added(Arc<Coupling>),
    /// A single coupling was unregistered.
    Removed(Arc<Coupling>),
    /// Several couplings were unregistered in one operation.
    BulkRemoved(Vec<Arc<Coupling>>),
}

/// Outcome of one [`CouplingManager::sync_all`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Couplings whose value reached the consumer.
    pub propagated: usize,
    /// Couplings dropped because an endpoint vanished.
    pub pruned: usize,
    /// Couplings whose consumer rejected the value or whose endpoint
    /// panicked.
    pub failed: usize,
}

/// Sole owner of the live coupling set.
///
/// The set is an immutable snapshot swapped on every mutation; writers are
/// serialized by an internal lock, readers never block.
///
/// A manager attached to a [`ComponentRegistry`] records which component
/// exposed each endpoint and treats an endpoint as vanished once that
/// component is gone or no longer exposes it.
pub struct CouplingManager {
    couplings: ArcSwap<Vec<Arc<Coupling>>>,
    writer: Mutex<()>,
    next_id: AtomicU64,
    events: EventBus<CouplingEvent>,
    components: Option<Arc<ComponentRegistry>>,
}

impl CouplingManager {
    /// Creates an empty manager that only tracks endpoint state liveness.
    pub fn new() -> Self {
        Self {
            couplings: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            next_id: AtomicU64::new(1),
            events: EventBus::new(),
            components: None,
        }
    }

    /// Creates an empty manager that also checks endpoints against the
    /// containers `components` currently expose.
    pub fn with_components(components: Arc<ComponentRegistry>) -> Self {
        Self {
            components: Some(components),
            ..Self::new()
        }
    }

    /// Subscribes to coupling lifecycle events.
    pub fn subscribe(&self) -> Receiver<CouplingEvent> {
        self.events.subscribe()
    }

    /// Binds `producer` to `consumer`.
    ///
    /// Fails with [`CouplingError::TypeMismatch`] when the declared value
    /// types differ, leaving the set untouched. An identical binding that
    /// already exists is not an error; a second instance is registered.
    pub fn create(&self, producer: Producer, consumer: Consumer) -> CouplingResult<Arc<Coupling>> {
        if producer.value_type() != consumer.value_type() {
            return Err(CouplingError::TypeMismatch {
                producer: producer.key().clone(),
                producer_type: producer.value_type(),
                consumer: consumer.key().clone(),
                consumer_type: consumer.value_type(),
            });
        }

        let owners = self.resolve_owners(&producer, &consumer);
        let id = CouplingId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let coupling = Arc::new(Coupling::new(id, producer, consumer, owners));
        {
            let _guard = self.writer.lock();
            let mut next = Vec::clone(&self.couplings.load());
            next.push(Arc::clone(&coupling));
            self.couplings.store(Arc::new(next));
        }
        debug!("coupling added {} {}", id, coupling.label());
        self.events.publish(CouplingEvent::Added(Arc::clone(&coupling)));
        Ok(coupling)
    }

    /// Unregisters `coupling`. Returns false when it was not registered.
    pub fn remove(&self, coupling: &Coupling) -> bool {
        let removed = {
            let _guard = self.writer.lock();
            let current = self.couplings.load_full();
            let Some(pos) = current.iter().position(|c| c.id() == coupling.id()) else {
                return false;
            };
            let mut next = Vec::clone(&current);
            let removed = next.remove(pos);
            self.couplings.store(Arc::new(next));
            removed
        };
        debug!("coupling removed {} {}", removed.id(), removed.label());
        self.events.publish(CouplingEvent::Removed(removed));
        true
    }

    /// Unregisters every coupling matching `predicate` and publishes a single
    /// [`CouplingEvent::BulkRemoved`] for the batch.
    pub fn remove_where<F>(&self, mut predicate: F) -> Vec<Arc<Coupling>>
    where
        F: FnMut(&Coupling) -> bool,
    {
        let removed = {
            let _guard = self.writer.lock();
            let current = self.couplings.load_full();
            let (removed, kept): (Vec<_>, Vec<_>) =
                current.iter().cloned().partition(|c| predicate(&**c));
            if removed.is_empty() {
                return removed;
            }
            self.couplings.store(Arc::new(kept));
            removed
        };
        debug!("couplings removed count={}", removed.len());
        self.events.publish(CouplingEvent::BulkRemoved(removed.clone()));
        removed
    }

    /// Removes every coupling with an endpoint owned by one of `owners`.
    pub fn remove_for_containers(&self, owners: &[ContainerId]) -> Vec<Arc<Coupling>> {
        if owners.is_empty() {
            return Vec::new();
        }
        self.remove_where(|c| c.touches(owners))
    }

    /// Removes every coupling attached to `component`, including endpoints
    /// in containers it no longer exposes. `containers` covers endpoints
    /// created without a known owner.
    pub fn remove_for_component(
        &self,
        component: ComponentId,
        containers: &[ContainerId],
    ) -> Vec<Arc<Coupling>> {
        self.remove_where(|c| c.belongs_to(component, containers))
    }

    /// Removes every coupling.
    pub fn clear(&self) -> Vec<Arc<Coupling>> {
        self.remove_where(|_| true)
    }

    /// Returns the live couplings, pruning any whose endpoint vanished.
    pub fn couplings(&self) -> Arc<Vec<Arc<Coupling>>> {
        self.prune_vanished();
        self.couplings.load_full()
    }

    /// Returns the coupling with `id`, if registered and live.
    pub fn get(&self, id: CouplingId) -> Option<Arc<Coupling>> {
        self.couplings().iter().find(|c| c.id() == id).cloned()
    }

    /// Returns true when `id` is registered.
    pub fn contains(&self, id: CouplingId) -> bool {
        self.couplings.load().iter().any(|c| c.id() == id)
    }

    /// Number of live couplings.
    pub fn len(&self) -> usize {
        self.couplings().len()
    }

    /// Returns true when no live couplings remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true while both endpoints are live and, when attached to a
    /// registry, still exposed by the components that owned them.
    pub fn is_present(&self, coupling: &Coupling) -> bool {
        if !coupling.is_live() {
            return false;
        }
        let Some(components) = &self.components else {
            return true;
        };
        let owners = coupling.owners();
        let producer = owners.producer.map_or(true, |id| {
            components
                .get(id)
                .is_some_and(|h| h.exposes_producer(coupling.producer().key()))
        });
        let consumer = owners.consumer.map_or(true, |id| {
            components
                .get(id)
                .is_some_and(|h| h.exposes_consumer(coupling.consumer().key()))
        });
        producer && consumer
    }

    /// Drops couplings whose producer or consumer is no longer present.
    pub fn prune_vanished(&self) -> usize {
        if self.couplings.load().iter().all(|c| self.is_present(c)) {
            return 0;
        }
        let pruned = self.remove_where(|c| !self.is_present(c));
        for coupling in &pruned {
            warn!("pruned coupling with vanished endpoint {}", coupling.label());
        }
        pruned.len()
    }

    /// Propagates every live coupling once: producer value into consumer.
    ///
    /// Propagation order across couplings is unspecified.
    pub fn sync_all(&self) -> SyncReport {
        let snapshot = self.couplings.load_full();
        let mut report = SyncReport::default();
        let mut vanished: SmallVec<[CouplingId; 8]> = SmallVec::new();

        for coupling in snapshot.iter() {
            if !self.is_present(coupling) {
                trace!("sync skipped {}: endpoint no longer exposed", coupling.id());
                vanished.push(coupling.id());
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| coupling.propagate())) {
                Ok(Ok(())) => report.propagated += 1,
                Ok(Err(CouplingError::Vanished(key))) => {
                    trace!("sync skipped {}: {} vanished", coupling.id(), key);
                    vanished.push(coupling.id());
                }
                Ok(Err(err)) => {
                    warn!("sync failed for {}: {}", coupling.label(), err);
                    report.failed += 1;
                }
                Err(_) => {
                    warn!("sync panicked for {}", coupling.label());
                    report.failed += 1;
                }
            }
        }

        if !vanished.is_empty() {
            report.pruned = self.remove_where(|c| vanished.contains(&c.id())).len();
        }
        report
    }

    /// Persistable descriptors for every live coupling.
    pub fn descriptors(&self) -> Vec<CouplingDescriptor> {
        self.couplings().iter().map(|c| c.descriptor()).collect()
    }

    /// Rebuilds couplings from descriptors against already restored
    /// components.
    ///
    /// Stops at the first descriptor that fails to resolve or type-check;
    /// couplings created before that point stay registered.
    pub fn restore(
        &self,
        descriptors: &[CouplingDescriptor],
        lookup: &dyn AttributeLookup,
    ) -> CouplingResult<Vec<Arc<Coupling>>> {
        let mut restored = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let producer_key = descriptor.producer_key();
            let consumer_key = descriptor.consumer_key();
            let producer = lookup
                .find_producer(&producer_key)
                .ok_or(CouplingError::UnresolvedAttribute(producer_key))?;
            let consumer = lookup
                .find_consumer(&consumer_key)
                .ok_or(CouplingError::UnresolvedAttribute(consumer_key))?;
            restored.push(self.create(producer, consumer)?);
        }
        Ok(restored)
    }

    fn resolve_owners(&self, producer: &Producer, consumer: &Consumer) -> EndpointOwners {
        let Some(components) = &self.components else {
            return EndpointOwners::default();
        };
        EndpointOwners {
            producer: components.producer_owner(producer.key()),
            consumer: components.consumer_owner(consumer.key()),
        }
    }
}

impl Default for CouplingManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribute_abi::{AttributeContainer, AttributeTable, Component, ValueType};
    use parking_lot::Mutex;

    fn slot(owner: &str) -> (Arc<Mutex<f64>>, Producer, Consumer) {
        let state = Arc::new(Mutex::new(0.0_f64));
        let producer = Producer::anchored(owner, "out", "out", &state, |s| *s.lock());
        let consumer = Consumer::anchored(owner, "in", "in", &state, |s, v: f64| *s.lock() = v);
        (state, producer, consumer)
    }

    #[test]
    fn create_rejects_mismatched_types() {
        let manager = CouplingManager::new();
        let events = manager.subscribe();
        let producer = Producer::new("a", "count", "count", || 1_u32);
        let consumer = Consumer::new("b", "level", "level", |_: f64| {});

        let err = manager.create(producer, consumer).expect_err("mismatch");
        assert!(matches!(
            err,
            CouplingError::TypeMismatch { producer_type, consumer_type, .. }
                if producer_type == ValueType::of::<u32>() && consumer_type == ValueType::of::<f64>()
        ));
        assert!(manager.is_empty());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn duplicate_bindings_are_distinct_instances() {
        let manager = CouplingManager::new();
        let (_a, producer, _) = slot("a");
        let (_b, _, consumer) = slot("b");

        let first = manager.create(producer.clone(), consumer.clone()).expect("first");
        let second = manager.create(producer, consumer).expect("second");

        assert_ne!(first.id(), second.id());
        assert_eq!(first.descriptor(), second.descriptor());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn remove_is_noop_for_unknown_coupling() {
        let manager = CouplingManager::new();
        let (_a, producer, _) = slot("a");
        let (_b, _, consumer) = slot("b");
        let coupling = manager.create(producer, consumer).expect("create");
        let events = manager.subscribe();

        assert!(manager.remove(&coupling));
        assert!(!manager.remove(&coupling));

        let seen: Vec<_> = events.try_iter().collect();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], CouplingEvent::Removed(ref c) if c.id() == coupling.id()));
    }

    #[test]
    fn remove_for_containers_publishes_one_bulk_event() {
        let manager = CouplingManager::new();
        let (_a, a_out, a_in) = slot("a");
        let (_b, b_out, b_in) = slot("b");
        let (_c, c_out, c_in) = slot("c");
        manager.create(a_out, b_in).expect("a>b");
        manager.create(b_out, c_in).expect("b>c");
        manager.create(c_out, a_in).expect("c>a");
        let events = manager.subscribe();

        let removed = manager.remove_for_containers(&[ContainerId::new("b")]);

        assert_eq!(removed.len(), 2);
        assert_eq!(manager.len(), 1);
        let seen: Vec<_> = events.try_iter().collect();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], CouplingEvent::BulkRemoved(ref list) if list.len() == 2));
    }

    #[test]
    fn sync_all_propagates_and_prunes_vanished_endpoints() {
        let _ = env_logger::builder().is_test(true).try_init();
        let manager = CouplingManager::new();
        let (a, a_out, _) = slot("a");
        let (b, _, b_in) = slot("b");
        let (c, _, c_in) = slot("c");
        manager.create(a_out.clone(), b_in).expect("a>b");
        manager.create(a_out, c_in).expect("a>c");
        *a.lock() = 4.0;

        drop(c);
        let report = manager.sync_all();

        assert_eq!(report.propagated, 1);
        assert_eq!(report.pruned, 1);
        assert_eq!(*b.lock(), 4.0);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn couplings_snapshot_prunes_on_access() {
        let manager = CouplingManager::new();
        let (a, a_out, _) = slot("a");
        let (_b, _, b_in) = slot("b");
        manager.create(a_out, b_in).expect("a>b");
        let events = manager.subscribe();

        drop(a);

        assert!(manager.couplings().is_empty());
        assert!(matches!(
            events.try_recv(),
            Ok(CouplingEvent::BulkRemoved(ref list)) if list.len() == 1
        ));
    }

    /// Component whose containers can be withdrawn while it stays registered.
    struct Shelf {
        tables: Mutex<Vec<Arc<AttributeTable>>>,
    }

    impl Shelf {
        fn new(tables: Vec<AttributeTable>) -> Arc<Self> {
            Arc::new(Self {
                tables: Mutex::new(tables.into_iter().map(Arc::new).collect()),
            })
        }

        fn withdraw(&self, id: &str) {
            self.tables.lock().retain(|t| t.id().as_str() != id);
        }
    }

    impl Component for Shelf {
        fn name(&self) -> &str {
            "shelf"
        }

        fn update(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn attribute_containers(&self) -> Vec<Arc<dyn AttributeContainer>> {
            self.tables
                .lock()
                .iter()
                .map(|t| Arc::clone(t) as Arc<dyn AttributeContainer>)
                .collect()
        }
    }

    fn attached() -> (Arc<ComponentRegistry>, CouplingManager) {
        let registry = Arc::new(ComponentRegistry::new());
        let manager = CouplingManager::with_components(Arc::clone(&registry));
        (registry, manager)
    }

    #[test]
    fn withdrawn_container_prunes_free_standing_endpoints() {
        let (registry, manager) = attached();
        let shelf = Shelf::new(vec![
            AttributeTable::new("shelf/a")
                .with_producer(Producer::new("shelf/a", "out", "", || 1.0_f64)),
            AttributeTable::new("shelf/b")
                .with_consumer(Consumer::new("shelf/b", "in", "", |_: f64| {})),
        ]);
        let handle = registry.add(Arc::clone(&shelf) as Arc<dyn Component>).expect("add");
        let coupling = manager
            .create(
                Producer::new("shelf/a", "out", "", || 1.0_f64),
                Consumer::new("shelf/b", "in", "", |_: f64| {}),
            )
            .expect("couple");
        assert_eq!(coupling.owners().producer, Some(handle.id()));
        assert_eq!(coupling.owners().consumer, Some(handle.id()));
        assert_eq!(manager.sync_all().propagated, 1);

        shelf.withdraw("shelf/a");

        assert!(manager.couplings().is_empty());
    }

    #[test]
    fn component_cascade_ignores_current_containers() {
        let (registry, manager) = attached();
        let shelf = Shelf::new(vec![AttributeTable::new("shelf/a")
            .with_producer(Producer::new("shelf/a", "out", "", || 2_u8))]);
        let handle = registry.add(Arc::clone(&shelf) as Arc<dyn Component>).expect("add");
        manager
            .create(
                Producer::new("shelf/a", "out", "", || 2_u8),
                Consumer::new("loose", "in", "", |_: u8| {}),
            )
            .expect("couple");

        shelf.withdraw("shelf/a");
        let removed = manager.remove_for_component(handle.id(), &handle.container_ids());

        assert_eq!(removed.len(), 1);
        assert!(manager.couplings().is_empty());
    }

    #[test]
    fn panicking_endpoint_counts_as_failed() {
        let manager = CouplingManager::new();
        let (b, _, b_in) = slot("b");
        manager
            .create(Producer::new("a", "out", "", || -> f64 { panic!("sensor offline") }), b_in)
            .expect("couple");
        let (c, c_out, _) = slot("c");
        let (d, _, d_in) = slot("d");
        manager.create(c_out, d_in).expect("c>d");
        *c.lock() = 3.0;

        let report = manager.sync_all();

        assert_eq!(report.failed, 1);
        assert_eq!(report.propagated, 1);
        assert_eq!(*b.lock(), 0.0);
        assert_eq!(*d.lock(), 3.0);
        assert_eq!(manager.len(), 2);
    }
}
