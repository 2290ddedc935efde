use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use tokio_util::sync::CancellationToken;

struct ActiveRun {
    generation: u64,
    cancel: CancellationToken,
}

/// Per-segment bookkeeping of the run in flight.
///
/// A new fire cancels whatever run is current and then waits on `exec` for it
/// to wind down, so two runs of one segment never execute effects at the same
/// time.
pub(crate) struct RunSlot {
    current: Mutex<Option<ActiveRun>>,
    next_generation: AtomicU64,
    exec: tokio::sync::Mutex<()>,
}

impl RunSlot {
    pub(crate) fn new() -> Self {
        Self {
            current: Mutex::new(None),
            next_generation: AtomicU64::new(0),
            exec: tokio::sync::Mutex::new(()),
        }
    }

    /// Become the current run, cancelling the previous one.
    pub(crate) fn begin(&self) -> RunTicket<'_> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        let previous = self.current().replace(ActiveRun {
            generation,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            log::info!("superseding run generation {}", previous.generation);
            previous.cancel.cancel();
        }

        RunTicket {
            slot: self,
            generation,
            cancel,
        }
    }

    /// Cancel the current run, if any.
    pub(crate) fn cancel(&self) -> bool {
        match self.current().as_ref() {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the lifetime of one run; clears the slot when dropped unless a
/// newer run has already taken it over.
pub(crate) struct RunTicket<'a> {
    slot: &'a RunSlot,
    generation: u64,
    cancel: CancellationToken,
}

impl RunTicket<'_> {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until the previous run has released the segment. Returns `None`
    /// if this run was superseded or cancelled while waiting.
    pub(crate) async fn exclusive(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            guard = self.slot.exec.lock() => Some(guard),
        }
    }
}

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        let mut current = self.slot.current();
        if current
            .as_ref()
            .is_some_and(|active| active.generation == self.generation)
        {
            *current = None;
        }
    }
}
