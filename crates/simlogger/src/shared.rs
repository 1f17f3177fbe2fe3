//! Thread-safe wrapper around a [`FlightSession`].
//!
//! All session state sits behind one mutex. Composition additionally holds an
//! in-flight flag, so a second `finalize` while one is running is rejected
//! with [`Error::CompositionInProgress`] instead of queueing behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::error::{Error, Result};
use crate::recorder::{ComposedLog, FinalizeReason};
use crate::session::FlightSession;

/// A [`FlightSession`] that can be shared between threads.
#[derive(Debug)]
pub struct SharedSession {
    session: Mutex<FlightSession>,
    composing: AtomicBool,
}

/// Clears the in-flight flag when composition ends.
#[derive(Debug)]
struct CompositionGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CompositionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SharedSession {
    /// Wrap a session.
    #[must_use]
    pub fn new(session: FlightSession) -> Self {
        Self {
            session: Mutex::new(session),
            composing: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlightSession> {
        // A panic elsewhere leaves the session usable; its state is never half-written.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_composition(&self) -> Result<CompositionGuard<'_>> {
        self.composing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| {
                warn!("Finalize requested while a log is already being composed");
                Error::CompositionInProgress
            })?;
        Ok(CompositionGuard {
            flag: &self.composing,
        })
    }

    /// Run `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut FlightSession) -> R) -> R {
        f(&mut self.lock())
    }

    /// Whether a composition is currently running.
    #[must_use]
    pub fn is_composing(&self) -> bool {
        self.composing.load(Ordering::Acquire)
    }

    /// Compose the log. At most one composition runs at a time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CompositionInProgress`] if another call is composing,
    /// or any error from [`FlightSession::finalize`].
    pub fn finalize(&self, reason: FinalizeReason) -> Result<ComposedLog> {
        let _guard = self.begin_composition()?;
        self.lock().finalize(reason)
    }

    /// Unwrap the session.
    #[must_use]
    pub fn into_inner(self) -> FlightSession {
        self.session
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
