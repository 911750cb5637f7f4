use std::sync::Arc;

use attribute_abi::{
    AttributeKey, Component, ComponentHandle, ComponentId, ComponentRegistry, Consumer, Producer,
};
use couplings::{AttributeLookup, Coupling, CouplingDescriptor, CouplingError, CouplingManager};
use log::debug;
use update_actions::UpdateActionManager;
use updater::{UpdaterConfig, WorkspaceUpdater};

use crate::error::WorkspaceResult;

/// Components, couplings, schedule and updater of one simulation.
pub struct Workspace {
    components: Arc<ComponentRegistry>,
    couplings: Arc<CouplingManager>,
    actions: Arc<UpdateActionManager>,
    updater: WorkspaceUpdater,
}

impl Workspace {
    /// Creates a builder with the default updater configuration.
    pub fn builder() -> WorkspaceBuilder {
        WorkspaceBuilder::new()
    }

    /// Creates a workspace with the default updater configuration.
    pub fn new() -> WorkspaceResult<Self> {
        Self::builder().build()
    }

    /// Registers a component. Fails when one of its container ids is
    /// already exposed by a registered component.
    pub fn add_component(
        &self,
        component: Arc<dyn Component>,
    ) -> WorkspaceResult<ComponentHandle> {
        let handle = self.components.add(component)?;
        self.actions.sync_lifecycle();
        debug!("workspace added {} {}", handle.id(), handle.name());
        Ok(handle)
    }

    /// Removes a component together with every coupling attached to it,
    /// including couplings into containers it has stopped exposing. Returns
    /// `None` when the id is unknown.
    pub fn remove_component(&self, id: ComponentId) -> Option<ComponentHandle> {
        let handle = self.components.get(id)?;
        let containers = handle.container_ids();
        let removed = self.components.remove(id)?;
        let dropped = self.couplings.remove_for_component(id, &containers);
        self.actions.sync_lifecycle();
        debug!(
            "workspace removed {} {} with {} couplings",
            removed.id(),
            removed.name(),
            dropped.len()
        );
        Some(removed)
    }

    /// Looks up a component by id.
    pub fn component(&self, id: ComponentId) -> Option<ComponentHandle> {
        self.components.get(id)
    }

    /// Looks up the first component named `name`.
    pub fn component_by_name(&self, name: &str) -> Option<ComponentHandle> {
        self.components.find_by_name(name)
    }

    /// Snapshot of every registered component.
    pub fn components(&self) -> Arc<Vec<ComponentHandle>> {
        self.components.snapshot()
    }

    /// Couples `producer` to `consumer`.
    pub fn couple(&self, producer: Producer, consumer: Consumer) -> WorkspaceResult<Arc<Coupling>> {
        let coupling = self.couplings.create(producer, consumer)?;
        self.actions.sync_lifecycle();
        Ok(coupling)
    }

    /// Couples two attributes identified by key.
    pub fn couple_keys(
        &self,
        producer: &AttributeKey,
        consumer: &AttributeKey,
    ) -> WorkspaceResult<Arc<Coupling>> {
        let producer_attr = self
            .find_producer(producer)
            .ok_or_else(|| CouplingError::UnresolvedAttribute(producer.clone()))?;
        let consumer_attr = self
            .find_consumer(consumer)
            .ok_or_else(|| CouplingError::UnresolvedAttribute(consumer.clone()))?;
        self.couple(producer_attr, consumer_attr)
    }

    /// Removes a coupling. Returns false when it was not registered.
    pub fn decouple(&self, coupling: &Coupling) -> bool {
        let removed = self.couplings.remove(coupling);
        self.actions.sync_lifecycle();
        removed
    }

    /// Snapshot of every live coupling. Couplings whose endpoints vanished
    /// are pruned first.
    pub fn couplings(&self) -> Arc<Vec<Arc<Coupling>>> {
        let couplings = self.couplings.couplings();
        self.actions.sync_lifecycle();
        couplings
    }

    /// Removes every component and coupling and restores the default
    /// schedule.
    pub fn clear(&self) {
        self.couplings.clear();
        self.components.clear();
        self.updater.clear_all_faults();
        self.actions.set_default_update_actions();
        debug!("workspace cleared");
    }

    /// The component registry.
    pub fn component_registry(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    /// The coupling manager.
    pub fn coupling_manager(&self) -> &Arc<CouplingManager> {
        &self.couplings
    }

    /// The update action manager.
    pub fn update_action_manager(&self) -> &Arc<UpdateActionManager> {
        &self.actions
    }

    /// The updater.
    pub fn updater(&self) -> &WorkspaceUpdater {
        &self.updater
    }

    /// Runs one tick on the calling thread.
    pub fn run_once(&self) -> WorkspaceResult<()> {
        Ok(self.updater.run_once()?)
    }

    /// Runs up to `n` ticks on the calling thread.
    pub fn iterate(&self, n: u64) -> WorkspaceResult<u64> {
        Ok(self.updater.iterate(n)?)
    }

    /// Starts the background run loop.
    pub fn run(&self) -> WorkspaceResult<()> {
        Ok(self.updater.run()?)
    }

    /// Requests the run loop to stop.
    pub fn stop(&self) {
        self.updater.stop();
    }

    /// Persistable form of every live coupling.
    pub fn coupling_descriptors(&self) -> Vec<CouplingDescriptor> {
        self.couplings.descriptors()
    }

    /// Recreates couplings from descriptors against the registered
    /// components.
    pub fn restore_couplings(
        &self,
        descriptors: &[CouplingDescriptor],
    ) -> WorkspaceResult<Vec<Arc<Coupling>>> {
        let restored = self.couplings.restore(descriptors, self);
        self.actions.sync_lifecycle();
        Ok(restored?)
    }
}

impl AttributeLookup for Workspace {
    fn find_producer(&self, key: &AttributeKey) -> Option<Producer> {
        self.components.snapshot().iter().find_map(|handle| {
            handle
                .component()
                .attribute_containers()
                .iter()
                .filter(|container| container.container_id() == key.owner)
                .find_map(|container| container.producer(&key.id))
        })
    }

    fn find_consumer(&self, key: &AttributeKey) -> Option<Consumer> {
        self.components.snapshot().iter().find_map(|handle| {
            handle
                .component()
                .attribute_containers()
                .iter()
                .filter(|container| container.container_id() == key.owner)
                .find_map(|container| container.consumer(&key.id))
        })
    }
}

/// Builder for [`Workspace`].
#[derive(Clone, Debug, Default)]
pub struct WorkspaceBuilder {
    config: UpdaterConfig,
}

impl WorkspaceBuilder {
    /// Creates a builder with the default updater configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the updater configuration.
    pub fn config(mut self, config: UpdaterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the update-all worker count.
    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.config = self.config.with_worker_threads(worker_threads);
        self
    }

    /// Builds the workspace and starts the updater's worker pool.
    pub fn build(self) -> WorkspaceResult<Workspace> {
        let components = Arc::new(ComponentRegistry::new());
        let couplings = Arc::new(CouplingManager::with_components(Arc::clone(&components)));
        let actions = Arc::new(UpdateActionManager::new(
            components.subscribe(),
            couplings.subscribe(),
        ));
        let updater = WorkspaceUpdater::new(
            self.config,
            Arc::clone(&components),
            Arc::clone(&couplings),
            Arc::clone(&actions),
        )?;
        Ok(Workspace {
            components,
            couplings,
            actions,
            updater,
        })
    }
}
