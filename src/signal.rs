// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The "wait for any completion, with a timeout" primitive.
//!
//! This is built the same way `tick::Delay` is built: one shared slot for a
//! single registered [`Waker`], bumped by a generation counter, polled by
//! hand. It deliberately does not reach for `futures_util::select!` or
//! `FuturesUnordered` — the hedging loop only ever has one outstanding
//! waiter at a time (itself), so a combinator crate buys nothing here that
//! a dozen lines of `poll` don't already give us.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tick::{Clock, Delay};

use crate::cancellation::{Cancelled, CancellationToken};

#[derive(Debug, Default)]
struct SignalState {
    generation: AtomicU64,
    waker: Mutex<Option<Waker>>,
}

/// A single-producer, single-waiter completion bell. Every attempt that
/// finishes calls [`CompletedSignal::notify`]; the hedging loop calls
/// [`CompletedSignal::wait_for_change`] to be woken the next time that
/// happens.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompletedSignal {
    state: Arc<SignalState>,
}

impl CompletedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.state.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(waker) = self.state.waker.lock().take() {
            waker.wake();
        }
    }

    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::Acquire)
    }

    pub fn wait_for_change(&self, since: u64) -> SignalWait {
        SignalWait { signal: self.clone(), since }
    }
}

pub(crate) struct SignalWait {
    signal: CompletedSignal,
    since: u64,
}

impl Future for SignalWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.signal.generation() != self.since {
            return Poll::Ready(());
        }
        *self.signal.state.waker.lock() = Some(cx.waker().clone());
        // Re-check after registering: a notification between the first
        // check and the registration above would otherwise be missed.
        if self.signal.generation() != self.since {
            return Poll::Ready(());
        }
        Poll::Pending
    }
}

/// Outcome of racing a [`CompletedSignal`] against a deadline or a
/// [`CancellationToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Completed,
    TimedOut,
    Cancelled,
}

/// Races `signal` against a timer of `timeout`, built by hand against
/// [`tick::Delay`] rather than through a combinator.
pub(crate) struct WaitWithTimeout {
    signal_wait: SignalWait,
    delay: Option<Delay>,
}

impl WaitWithTimeout {
    pub fn new(signal: &CompletedSignal, since: u64, clock: &Clock, timeout: Option<std::time::Duration>) -> Self {
        Self {
            signal_wait: signal.wait_for_change(since),
            delay: timeout.map(|duration| Delay::new(clock, duration)),
        }
    }
}

impl Future for WaitWithTimeout {
    type Output = WaitOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<WaitOutcome> {
        if Pin::new(&mut self.signal_wait).poll(cx).is_ready() {
            return Poll::Ready(WaitOutcome::Completed);
        }
        if let Some(delay) = self.delay.as_mut() {
            if Pin::new(delay).poll(cx).is_ready() {
                return Poll::Ready(WaitOutcome::TimedOut);
            }
        }
        Poll::Pending
    }
}

/// Races `signal` against `token`, for the unbounded wait that runs once no
/// further hedges remain to launch — without this, a token cancelled while
/// every loaded attempt is still in flight would never wake the waiter.
pub(crate) struct WaitCancellable {
    signal_wait: SignalWait,
    cancelled: Cancelled,
}

impl WaitCancellable {
    pub fn new(signal: &CompletedSignal, since: u64, token: &CancellationToken) -> Self {
        Self { signal_wait: signal.wait_for_change(since), cancelled: token.cancelled() }
    }
}

impl Future for WaitCancellable {
    type Output = WaitOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<WaitOutcome> {
        if Pin::new(&mut self.signal_wait).poll(cx).is_ready() {
            return Poll::Ready(WaitOutcome::Completed);
        }
        if Pin::new(&mut self.cancelled).poll(cx).is_ready() {
            return Poll::Ready(WaitOutcome::Cancelled);
        }
        Poll::Pending
    }
}
