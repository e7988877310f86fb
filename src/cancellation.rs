// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A minimal, parent-linked cancellation token.
//!
//! Each hedged attempt gets a child token derived from the call's root
//! token. Cancelling the root is observable from every child; cancelling a
//! child (to stop a losing attempt) has no effect on its siblings or the
//! root.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

#[derive(Clone, Debug)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    waker: Arc<Mutex<Option<Waker>>>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), waker: Arc::new(Mutex::new(None)), parent: None }
    }

    /// Creates a token whose cancellation also observes `self`'s.
    #[must_use]
    pub fn child(&self) -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), waker: Arc::new(Mutex::new(None)), parent: Some(Arc::new(self.clone())) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire) || self.parent.as_deref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Registers `waker` to be woken by [`Self::cancel`], on this token or
    /// any of its ancestors. Single-slot, like [`crate::signal::SignalWait`]:
    /// the cancellation tree only ever has one waiter at a time in this
    /// crate (the hedging loop).
    fn register(&self, waker: &Waker) {
        *self.waker.lock() = Some(waker.clone());
        if let Some(parent) = &self.parent {
            parent.register(waker);
        }
    }

    /// A future that resolves once this token (or an ancestor) is
    /// cancelled.
    #[must_use]
    pub(crate) fn cancelled(&self) -> Cancelled {
        Cancelled { token: self.clone() }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`CancellationToken::cancelled`].
pub(crate) struct Cancelled {
    token: CancellationToken,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.token.is_cancelled() {
            return Poll::Ready(());
        }
        self.token.register(cx.waker());
        // Re-check after registering: a cancellation between the first
        // check and the registration above would otherwise be missed.
        if self.token.is_cancelled() {
            return Poll::Ready(());
        }
        Poll::Pending
    }
}
