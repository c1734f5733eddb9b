//! Cooperative cancellation
//!
//! A [`CancelToken`] is handed to [`revolve`](crate::revolve) and polled
//! at every node boundary; during a user-function call the executor
//! parks on a [`WaitSlot`] that is woken by either the worker finishing
//! or the token being cancelled, whichever comes first. Cancellation is
//! cooperative only: a running user function is never killed, its late
//! result is simply discarded.
//!
//! Per-call deadlines are the caller's concern — derive a time-bounded
//! token with [`CancelToken::with_timeout`] and pass that instead.

use crate::error::{ResolveError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Cloneable cancellation handle.
///
/// All clones share the same state; cancelling any of them cancels the
/// resolve using any other.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    waiters: Mutex<Vec<Weak<dyn Notify>>>,
}

impl CancelToken {
    /// A token that never expires on its own.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A token that reads as cancelled once `deadline` passes.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    /// A token that reads as cancelled after `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    fn build(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                deadline,
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Trigger cancellation and wake every parked waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        for waiter in self.inner.waiters.lock().drain(..) {
            if let Some(waiter) = waiter.upgrade() {
                waiter.notify();
            }
        }
    }

    /// True once [`cancel`](Self::cancel) was called or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.inner.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Register a waiter to be woken on cancellation; deregistered when
    /// the guard drops.
    pub(crate) fn register(&self, waiter: Arc<dyn Notify>) -> WaiterGuard {
        let target = Arc::downgrade(&waiter);
        self.inner.waiters.lock().push(target.clone());
        WaiterGuard {
            token: Arc::clone(&self.inner),
            target,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

/// Something parked that cancellation must wake.
pub(crate) trait Notify: Send + Sync + 'static {
    fn notify(&self);
}

/// Removes the waiter registration on drop.
pub(crate) struct WaiterGuard {
    token: Arc<TokenInner>,
    target: Weak<dyn Notify>,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.token
            .waiters
            .lock()
            .retain(|w| !w.ptr_eq(&self.target));
    }
}

/// One-shot rendezvous between a worker thread and the resolver.
pub(crate) struct WaitSlot<T> {
    state: Mutex<Option<T>>,
    cvar: Condvar,
}

impl<T: Send + 'static> WaitSlot<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(None),
            cvar: Condvar::new(),
        })
    }

    /// Deposit the worker's result and wake the resolver.
    pub(crate) fn fill(&self, value: T) {
        *self.state.lock() = Some(value);
        self.cvar.notify_all();
    }

    /// Block until the slot is filled or the token cancels.
    ///
    /// Returns `None` on cancellation; the worker keeps running and its
    /// eventual result is dropped with the slot.
    pub(crate) fn wait(&self, token: &CancelToken) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.take() {
                return Some(value);
            }
            if token.is_cancelled() {
                return None;
            }
            match token.deadline() {
                Some(deadline) => {
                    let _ = self.cvar.wait_until(&mut state, deadline);
                }
                None => self.cvar.wait(&mut state),
            }
        }
    }
}

impl<T: Send + 'static> Notify for WaitSlot<T> {
    fn notify(&self) {
        self.cvar.notify_all();
    }
}
