use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use attribute_abi::{ComponentHandle, ComponentId, ComponentRegistry, EventBus};
use couplings::{Coupling, CouplingError, CouplingManager};
use crossbeam_channel::{bounded, Receiver};
use log::{debug, trace, warn};
use parking_lot::Mutex;
use update_actions::{ActionFlow, TickContext, UpdateActionManager};

use crate::config::UpdaterConfig;
use crate::error::{UpdaterError, UpdaterResult};
use crate::fault::{panic_message, ComponentFault, FaultRegistry};
use crate::pool::WorkerPool;
use crate::state::{UpdaterEvent, UpdaterState};

/// State shared between the updater handle and its run loop thread.
struct Shared {
    config: UpdaterConfig,
    components: Arc<ComponentRegistry>,
    couplings: Arc<CouplingManager>,
    actions: Arc<UpdateActionManager>,
    pool: WorkerPool,
    state: Mutex<UpdaterState>,
    stop: AtomicBool,
    ticks: AtomicU64,
    begun: AtomicU64,
    faults: FaultRegistry,
    events: EventBus<UpdaterEvent>,
}

/// Drives ticks over a workspace's components, couplings and schedule.
pub struct WorkspaceUpdater {
    shared: Arc<Shared>,
    run_thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkspaceUpdater {
    /// Creates an idle updater and starts its worker pool.
    pub fn new(
        config: UpdaterConfig,
        components: Arc<ComponentRegistry>,
        couplings: Arc<CouplingManager>,
        actions: Arc<UpdateActionManager>,
    ) -> UpdaterResult<Self> {
        let pool = WorkerPool::new(config.effective_workers(), &config.thread_name)?;
        debug!(
            "updater created workers={} thread={}",
            pool.size(),
            config.thread_name
        );
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                components,
                couplings,
                actions,
                pool,
                state: Mutex::new(UpdaterState::Idle),
                stop: AtomicBool::new(false),
                ticks: AtomicU64::new(0),
                begun: AtomicU64::new(0),
                faults: FaultRegistry::default(),
                events: EventBus::new(),
            }),
            run_thread: Mutex::new(None),
        })
    }

    /// Subscribes to updater notifications.
    pub fn subscribe(&self) -> Receiver<UpdaterEvent> {
        self.shared.events.subscribe()
    }

    /// Configuration the updater was built with.
    pub fn config(&self) -> &UpdaterConfig {
        &self.shared.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> UpdaterState {
        *self.shared.state.lock()
    }

    /// Number of ticks that ran every scheduled action.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// Executes the schedule exactly once on the calling thread.
    pub fn run_once(&self) -> UpdaterResult<()> {
        self.iterate(1).map(|_| ())
    }

    /// Executes up to `n` ticks on the calling thread, returning how many
    /// completed before a stop.
    pub fn iterate(&self, n: u64) -> UpdaterResult<u64> {
        self.shared.begin(UpdaterState::SteppingOnce)?;
        let _idle = IdleOnExit(&self.shared);
        let mut completed = 0;
        for _ in 0..n {
            if self.shared.stop_requested() {
                break;
            }
            if self.shared.tick() {
                completed += 1;
            }
        }
        Ok(completed)
    }

    /// Starts the run loop on its own thread.
    pub fn run(&self) -> UpdaterResult<()> {
        self.shared.begin(UpdaterState::Running)?;
        let mut slot = self.run_thread.lock();
        if let Some(previous) = slot.take() {
            // Already idle, so the previous loop has returned.
            if previous.join().is_err() {
                warn!("previous run loop panicked");
            }
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || shared.run_loop());
        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.finish();
                Err(UpdaterError::Spawn(err))
            }
        }
    }

    /// Requests a stop. Safe to call from any thread and more than once.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Waits for the run loop thread, if any, to exit.
    pub fn join(&self) {
        let handle = self.run_thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("run loop panicked");
            }
        }
    }

    /// Faults currently recorded.
    pub fn faults(&self) -> Vec<ComponentFault> {
        self.shared.faults.list()
    }

    /// Returns true when component `id` is skipped because of a fault.
    pub fn is_faulted(&self, id: ComponentId) -> bool {
        self.shared.faults.is_faulted(id)
    }

    /// Re-enables a faulted component. Returns false when it was not faulted.
    pub fn clear_fault(&self, id: ComponentId) -> bool {
        let cleared = self.shared.faults.clear(id);
        if cleared {
            debug!("fault cleared for component {id}");
            self.shared.events.publish(UpdaterEvent::FaultCleared(id));
        }
        cleared
    }

    /// Re-enables every faulted component.
    pub fn clear_all_faults(&self) {
        for id in self.shared.faults.clear_all() {
            self.shared.events.publish(UpdaterEvent::FaultCleared(id));
        }
    }
}

impl Drop for WorkspaceUpdater {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

impl Shared {
    fn begin(&self, next: UpdaterState) -> UpdaterResult<()> {
        {
            let mut state = self.state.lock();
            if *state != UpdaterState::Idle {
                return Err(UpdaterError::Busy(*state));
            }
            *state = next;
            self.stop.store(false, Ordering::Release);
        }
        debug!("updater {next:?}");
        self.events.publish(UpdaterEvent::StateChanged(next));
        Ok(())
    }

    fn finish(&self) {
        *self.state.lock() = UpdaterState::Idle;
        debug!("updater idle after {} ticks", self.ticks.load(Ordering::Acquire));
        self.events.publish(UpdaterEvent::StateChanged(UpdaterState::Idle));
    }

    fn request_stop(&self) {
        let changed = {
            let mut state = self.state.lock();
            match *state {
                UpdaterState::Running | UpdaterState::SteppingOnce => {
                    self.stop.store(true, Ordering::Release);
                    *state = UpdaterState::Stopping;
                    true
                }
                UpdaterState::Idle | UpdaterState::Stopping => false,
            }
        };
        if changed {
            debug!("updater stopping");
            self.events
                .publish(UpdaterEvent::StateChanged(UpdaterState::Stopping));
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn run_loop(&self) {
        let _idle = IdleOnExit(self);
        while !self.stop_requested() {
            let idle = self.actions.snapshot().is_empty();
            self.tick();
            if idle {
                thread::sleep(self.config.delay_slice);
            }
        }
    }

    /// Runs one tick. Returns true when no action was skipped by a stop.
    fn tick(&self) -> bool {
        let actions = self.actions.snapshot();
        let runner = TickRunner {
            shared: self,
            tick: self.begun.fetch_add(1, Ordering::AcqRel),
            interrupted: Cell::new(false),
        };
        trace!("tick {} begin actions={}", runner.tick, actions.len());

        for action in actions.iter() {
            if self.stop_requested() {
                runner.interrupted.set(true);
                break;
            }
            match catch_unwind(AssertUnwindSafe(|| action.invoke(&runner))) {
                Ok(ActionFlow::Continue) => {}
                Ok(ActionFlow::Terminate) => {
                    debug!("{} requested termination", action.description());
                    self.request_stop();
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(
                        "action {} panicked on tick {}: {message}",
                        action.description(),
                        runner.tick
                    );
                    self.events.publish(UpdaterEvent::ActionFailed {
                        action: action.description(),
                        tick: runner.tick,
                        message,
                    });
                }
            }
        }

        if runner.interrupted.get() {
            trace!("tick {} interrupted", runner.tick);
            return false;
        }
        let count = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        self.events.publish(UpdaterEvent::TickCompleted(count));
        true
    }

    fn record_fault(&self, handle: &ComponentHandle, tick: u64, message: String) {
        warn!(
            "component {} ({}) faulted on tick {tick}: {message}",
            handle.name(),
            handle.id()
        );
        let fault = ComponentFault {
            component: handle.id(),
            name: handle.name().to_string(),
            tick,
            message,
        };
        self.faults.record(fault.clone());
        self.events.publish(UpdaterEvent::ComponentFaulted(fault));
    }
}

/// Returns the updater to idle when a stepping or run loop exits, including
/// by unwinding.
struct IdleOnExit<'a>(&'a Shared);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Outcome of one guarded component step.
type StepOutcome = Result<(), String>;

fn guarded_step(handle: &ComponentHandle) -> StepOutcome {
    match catch_unwind(AssertUnwindSafe(|| handle.update())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// Executes actions for a single tick on the controlling thread.
struct TickRunner<'a> {
    shared: &'a Shared,
    tick: u64,
    interrupted: Cell<bool>,
}

impl TickContext for TickRunner<'_> {
    fn update_all_components(&self) {
        let components = self.shared.components.snapshot();
        self.shared.faults.retain_live(&components);

        let (done_tx, done_rx) = bounded::<(ComponentHandle, StepOutcome)>(components.len());
        let mut dispatched = 0usize;
        for handle in components.iter() {
            if self.stop_requested() {
                self.interrupted.set(true);
                break;
            }
            if self.shared.faults.is_faulted(handle.id()) {
                continue;
            }
            let handle = handle.clone();
            let done_tx = done_tx.clone();
            self.shared.pool.execute(move || {
                let outcome = guarded_step(&handle);
                if let Err(lost) = done_tx.send((handle, outcome)) {
                    trace!("step report for {} dropped", lost.into_inner().0.id());
                }
            });
            dispatched += 1;
        }
        drop(done_tx);

        // Barrier: every dispatched step reports exactly once.
        for (handle, outcome) in done_rx.iter().take(dispatched) {
            if let Err(message) = outcome {
                self.shared.record_fault(&handle, self.tick, message);
            }
        }
        trace!("tick {} update-all stepped {dispatched}", self.tick);
    }

    fn update_component(&self, component: &ComponentHandle) {
        if self.shared.faults.is_faulted(component.id()) {
            return;
        }
        if let Err(message) = guarded_step(component) {
            self.shared.record_fault(component, self.tick, message);
        }
    }

    fn sync_all_couplings(&self) {
        let report = self.shared.couplings.sync_all();
        trace!(
            "tick {} sync propagated={} pruned={} failed={}",
            self.tick,
            report.propagated,
            report.pruned,
            report.failed
        );
    }

    fn sync_coupling(&self, coupling: &Coupling) {
        if !self.shared.couplings.is_present(coupling) {
            self.shared.couplings.prune_vanished();
            return;
        }
        match coupling.propagate() {
            Ok(()) => {}
            Err(CouplingError::Vanished(_)) => {
                self.shared.couplings.prune_vanished();
            }
            Err(err) => warn!("sync failed for {}: {err}", coupling.label()),
        }
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop_requested()
    }

    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let slice = self.shared.config.delay_slice.max(Duration::from_millis(1));
        loop {
            if self.stop_requested() {
                self.interrupted.set(true);
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }
}
