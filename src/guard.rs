//! Single-batch busy guard

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::BusyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardState {
    Idle,
    Running,
}

#[derive(Debug, Default)]
struct Inner {
    running: bool,
    generation: u64,
}

/// Process-wide `Idle | Running` flag. At most one ticket is live at a time.
#[derive(Debug, Default)]
pub struct PrintGuard {
    inner: Mutex<Inner>,
}

impl PrintGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Move to `Running`, or refuse if a batch already holds the guard.
    pub fn try_acquire(self: &Arc<Self>) -> Result<BatchTicket, BusyError> {
        let mut inner = self.lock();
        if inner.running {
            return Err(BusyError);
        }
        inner.running = true;
        inner.generation += 1;
        Ok(BatchTicket {
            guard: Arc::clone(self),
            generation: inner.generation,
            released: false,
        })
    }

    pub fn state(&self) -> GuardState {
        if self.lock().running {
            GuardState::Running
        } else {
            GuardState::Idle
        }
    }
}

/// Proof that the holder owns the running batch. Dropping it releases the guard.
#[derive(Debug)]
pub struct BatchTicket {
    guard: Arc<PrintGuard>,
    generation: u64,
    released: bool,
}

impl BatchTicket {
    /// Return the guard to `Idle`. Idempotent, and a stale ticket never
    /// releases a batch that started after it let go.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut inner = self.guard.lock();
        if inner.generation == self.generation {
            inner.running = false;
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for BatchTicket {
    fn drop(&mut self) {
        self.release();
    }
}
