//! Ordered, user-editable list of update actions executed once per tick.
//!
//! The [`UpdateActionManager`] owns the list as an atomically swapped
//! snapshot and keeps its generated per-component and per-coupling actions in
//! step with the component registry and coupling manager by draining their
//! event streams. Actions never touch the updater directly; they drive a
//! [`TickContext`] supplied by whoever executes the tick.
#![deny(missing_docs)]

mod action;
mod builtin;
mod error;
mod manager;

pub use action::{same_action, ActionFlow, ActionRef, ActionTarget, TickContext, UpdateAction};
pub use builtin::{
    DelayAction, FnAction, SyncCouplingsAction, UpdateAllAction, UpdateComponentAction,
    UpdateCouplingAction, DEFAULT_DELAY,
};
pub use error::{ScheduleError, ScheduleResult};
pub use manager::{ActionEvent, UpdateActionManager};
