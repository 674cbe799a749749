use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

/// Shared run state for the serving threads.
pub struct Status {
    alive: AtomicBool,
    ready_tracking: Mutex<HashMap<String, bool>>,
    answered: AtomicUsize,
    failed: AtomicUsize,
}

impl Status {
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            ready_tracking: Default::default(),
            answered: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }

    fn tracking(&self) -> MutexGuard<'_, HashMap<String, bool>> {
        self.ready_tracking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ready(&self, tag: &str) {
        self.tracking().insert(tag.to_string(), true);
    }

    pub fn not_ready(&self, tag: &str) {
        self.tracking().insert(tag.to_string(), false);
    }

    pub fn all_ready(&self) -> bool {
        self.tracking().values().all(|ready| *ready)
    }

    pub fn record_answer(&self) {
        self.answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}
