//! Device vibration capability.
//!
//! The engine only ever issues fire-and-forget requests through [`Vibrator`].
//! [`HapticsHandle`] is the shared, single-instance implementation: it owns the
//! device backend on a dedicated thread and serializes requests coming from any
//! number of concurrently running segments.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex, PoisonError,
};
use std::thread;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

/// Best-effort vibration. Must not block and has no failure path.
pub trait Vibrator: Send + Sync {
    /// Whether the device can vibrate at all. A `false` here turns Vibrate
    /// effects into skipped no-ops.
    fn is_available(&self) -> bool {
        true
    }

    fn vibrate(&self, duration_ms: u64);
}

/// The platform side of the haptics thread.
pub trait HapticBackend: Send + 'static {
    fn has_vibrator(&self) -> bool;

    fn vibrate(&mut self, duration_ms: u64);
}

/// Backend for hosts without a vibration motor.
#[derive(Debug, Default)]
pub struct NoHaptics;

impl HapticBackend for NoHaptics {
    fn has_vibrator(&self) -> bool {
        false
    }

    fn vibrate(&mut self, _duration_ms: u64) {}
}

/// Backend that reports each buzz through the log. Used by the desktop runner.
#[derive(Debug, Default)]
pub struct LogHaptics {
    pulses: u64,
}

impl HapticBackend for LogHaptics {
    fn has_vibrator(&self) -> bool {
        true
    }

    fn vibrate(&mut self, duration_ms: u64) {
        self.pulses += 1;
        log::info!("bzz #{} ({}ms)", self.pulses, duration_ms);
    }
}

enum HapticCommand {
    Vibrate(u64),
    Shutdown,
}

pub struct HapticsHandle {
    tx: Mutex<Option<Sender<HapticCommand>>>,
    backend: Mutex<Option<Box<dyn HapticBackend>>>,
    available: AtomicBool,
    requested: Arc<AtomicU64>,
}

impl HapticsHandle {
    pub fn new(backend: impl HapticBackend) -> Self {
        let available = backend.has_vibrator();
        Self {
            tx: Mutex::new(None),
            backend: Mutex::new(Some(Box::new(backend))),
            available: AtomicBool::new(available),
            requested: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of vibrations handed to the device thread so far.
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }

    fn ensure_thread(&self) -> Result<Sender<HapticCommand>, String> {
        let mut tx_guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = tx_guard.as_ref() {
            return Ok(tx.clone());
        }

        let mut backend = self
            .backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| "haptics thread already shut down".to_string())?;

        let (tx, rx) = mpsc::channel::<HapticCommand>();

        thread::Builder::new()
            .name("haptics".to_string())
            .spawn(move || {
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        HapticCommand::Vibrate(duration_ms) => backend.vibrate(duration_ms),
                        HapticCommand::Shutdown => break,
                    }
                }
                log_debug!("haptics thread exiting");
            })
            .map_err(|e| e.to_string())?;

        *tx_guard = Some(tx.clone());
        Ok(tx)
    }

    /// Stop the device thread. Later vibrate requests are dropped.
    pub fn shutdown(&self) {
        if let Some(tx) = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(HapticCommand::Shutdown);
        }
        self.backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.available.store(false, Ordering::SeqCst);
    }
}

impl Vibrator for HapticsHandle {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn vibrate(&self, duration_ms: u64) {
        if !self.is_available() {
            log_warn!("vibrator not available, skipping {}ms vibration", duration_ms);
            return;
        }

        let sent = self
            .ensure_thread()
            .and_then(|tx| tx.send(HapticCommand::Vibrate(duration_ms)).map_err(|e| e.to_string()));
        match sent {
            Ok(()) => {
                self.requested.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => log_error!("failed to hand vibration to haptics thread: {}", err),
        }
    }
}

impl Drop for HapticsHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
