//! Cross-crate scenarios for the workspace runtime.

#[cfg(test)]
mod lifecycle;

#[cfg(test)]
mod persistence;

#[cfg(test)]
mod propagation;

#[cfg(test)]
mod run_control;

#[cfg(test)]
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
