// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cooperative cancellation for an in-flight variation generation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cheaply-cloneable handle shared between the generation task and
/// whoever might need to stop it (an HTTP disconnect, a discard request,
/// the daemon shutting down).
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// A fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Mark the token cancelled and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once this token is cancelled. Safe to race in a
    /// `tokio::select!` alongside normal generation work.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a variation's generation was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// The client explicitly discarded the variation mid-stream.
    UserDiscard,
    /// Generation exceeded its time budget.
    Timeout,
    /// A configured budget dimension (phrases, tokens, cost) was exhausted.
    BudgetExhausted,
    /// The daemon is shutting down.
    ServerShutdown,
}

impl CancellationReason {
    /// Human-readable description, suitable for a variation's `errorMessage`.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            CancellationReason::UserDiscard => "discarded by client",
            CancellationReason::Timeout => "generation timed out",
            CancellationReason::BudgetExhausted => "generation budget exhausted",
            CancellationReason::ServerShutdown => "server shutting down",
        }
    }
}

/// A [`CancellationToken`] paired with the first reason anyone gave for
/// cancelling it. Later calls to [`Self::cancel`] are no-ops once a reason
/// has been recorded, so the original cause is never overwritten.
#[derive(Debug, Clone)]
pub struct CancellableRun {
    token: CancellationToken,
    reason: Arc<Mutex<Option<CancellationReason>>>,
}

impl CancellableRun {
    /// Wrap an existing token, tracking the reason for its cancellation.
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Cancel the run. If this is the first call to record a reason, it
    /// wins; subsequent calls still cancel the token but leave the
    /// recorded reason untouched.
    pub fn cancel(&self, reason: CancellationReason) {
        let mut guard = self.reason.lock().expect("cancellation reason lock poisoned");
        if guard.is_none() {
            *guard = Some(reason);
        }
        drop(guard);
        self.token.cancel();
    }

    /// Whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The first reason given for cancellation, if any.
    #[must_use]
    pub fn reason(&self) -> Option<CancellationReason> {
        *self.reason.lock().expect("cancellation reason lock poisoned")
    }

    /// The underlying token, for passing into `tokio::select!`.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
