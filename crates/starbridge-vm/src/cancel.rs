//! Cancellation primitives
//!
//! `CancellationToken` is the host-side signal (optionally deadline driven)
//! stored in a thread's `context` local. `CancelHandle` is the flag the
//! interpreter polls between statements; a supervisor copies the token's
//! state onto it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Why a token fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Canceled => f.write_str("context canceled"),
            CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

#[derive(Debug)]
struct TokenInner {
    reason: Mutex<Option<CancelReason>>,
    signal: Condvar,
    deadline: Option<Instant>,
}

/// One-shot cancellation signal shared between host and guest
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    fn build(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                reason: Mutex::new(None),
                signal: Condvar::new(),
                deadline,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Fire the token; later calls keep the first reason
    pub fn cancel(&self) {
        self.fire(CancelReason::Canceled);
    }

    fn fire(&self, reason: CancelReason) {
        let mut slot = self.inner.reason.lock();
        if slot.is_none() {
            *slot = Some(reason);
        }
        self.inner.signal.notify_all();
    }

    pub fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = *self.inner.reason.lock() {
            return Some(reason);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.fire(CancelReason::DeadlineExceeded);
                Some(CancelReason::DeadlineExceeded)
            }
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Block for at most `timeout` or until the token fires.
    /// Returns the reason if it fired.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CancelReason> {
        let mut until = Instant::now() + timeout;
        if let Some(deadline) = self.inner.deadline {
            until = until.min(deadline);
        }
        {
            let mut slot = self.inner.reason.lock();
            while slot.is_none() {
                if self.inner.signal.wait_until(&mut slot, until).timed_out() {
                    break;
                }
            }
            if let Some(reason) = *slot {
                return Some(reason);
            }
        }
        self.reason()
    }
}

/// Cancellation flag polled by the interpreter
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug, Default)]
struct HandleInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, reason: impl Into<String>) {
        let mut slot = self.inner.reason.lock();
        if slot.is_none() {
            *slot = Some(reason.into());
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn uncancel(&self) {
        let mut slot = self.inner.reason.lock();
        *slot = None;
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    pub fn reason(&self) -> Option<String> {
        if !self.is_cancelled() {
            return None;
        }
        self.inner.reason.lock().clone()
    }
}
