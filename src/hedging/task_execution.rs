// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! C2: one racing attempt.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::context::ResilienceContext;
use crate::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptKind {
    Primary,
    Hedge,
}

/// Tracks one spawned attempt from launch through to acceptance or
/// cancellation. Reused across calls via [`crate::pool::Pool`]; [`Self::reset`]
/// must leave it indistinguishable from a freshly constructed slot.
pub(crate) struct TaskExecution<Out> {
    attempt_index: u32,
    kind: AttemptKind,
    context: ResilienceContext,
    handle: Option<JoinHandle<Out>>,
    outcome: Option<Outcome<Out>>,
    is_handled: bool,
    is_accepted: bool,
    is_judged: bool,
}

impl<Out: Send + 'static> TaskExecution<Out> {
    pub fn new() -> Self {
        Self {
            attempt_index: 0,
            kind: AttemptKind::Primary,
            context: ResilienceContext::new(),
            handle: None,
            outcome: None,
            is_handled: false,
            is_accepted: false,
            is_judged: false,
        }
    }

    pub fn reset(&mut self) {
        self.attempt_index = 0;
        self.kind = AttemptKind::Primary;
        self.context = ResilienceContext::new();
        self.handle = None;
        self.outcome = None;
        self.is_handled = false;
        self.is_accepted = false;
        self.is_judged = false;
    }

    pub fn start<Fut>(&mut self, attempt_index: u32, kind: AttemptKind, context: ResilienceContext, future: Fut)
    where
        Fut: Future<Output = Out> + Send + 'static,
    {
        self.attempt_index = attempt_index;
        self.kind = kind;
        self.context = context;
        self.handle = Some(tokio::spawn(future));
    }

    pub const fn attempt_index(&self) -> u32 {
        self.attempt_index
    }

    pub const fn kind(&self) -> AttemptKind {
        self.kind
    }

    pub const fn context(&self) -> &ResilienceContext {
        &self.context
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Awaits the spawned task to quiescence, caching its classified
    /// outcome. Calling this more than once after the first await is a
    /// cheap cache hit.
    pub async fn observe(&mut self) -> &Outcome<Out> {
        if self.outcome.is_none() {
            let handle = self.handle.take().expect("observe called before start");
            self.outcome = Some(Outcome::from_join_result(handle.await));
        }
        self.outcome.as_ref().expect("just populated above")
    }

    pub fn set_handled(&mut self, handled: bool) {
        self.is_handled = handled;
        self.is_judged = true;
    }

    pub const fn is_handled(&self) -> bool {
        self.is_handled
    }

    pub const fn is_judged(&self) -> bool {
        self.is_judged
    }

    pub fn take_outcome(&mut self) -> Option<Outcome<Out>> {
        self.outcome.take()
    }

    pub fn accept(&mut self) {
        self.is_accepted = true;
    }

    pub const fn is_accepted(&self) -> bool {
        self.is_accepted
    }

    /// Cancels and aborts the attempt. Safe to call on an already-finished
    /// attempt (the abort is then a no-op).
    pub fn cancel(&self) {
        self.context.cancellation().cancel();
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Awaits the spawned task down to quiescence without recording its
    /// outcome, for attempts that lost the race and are being returned to
    /// the pool.
    pub async fn quiesce(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttemptKind, TaskExecution};
    use crate::context::ResilienceContext;

    #[tokio::test]
    async fn observe_caches_the_outcome() {
        let mut execution = TaskExecution::<u32>::new();
        execution.start(0, AttemptKind::Primary, ResilienceContext::new(), async { 42 });
        assert_eq!(execution.observe().await.as_success(), Some(&42));
        assert_eq!(execution.observe().await.as_success(), Some(&42));
    }

    #[tokio::test]
    async fn cancel_aborts_the_underlying_task() {
        let mut execution = TaskExecution::<u32>::new();
        execution.start(0, AttemptKind::Hedge, ResilienceContext::new(), async {
            std::future::pending::<()>().await;
            0
        });
        execution.cancel();
        assert!(execution.context().is_cancelled());
        assert!(matches!(execution.observe().await, crate::outcome::Outcome::Failure(_)));
    }

    #[test]
    fn reset_restores_pristine_state() {
        let mut execution = TaskExecution::<u32>::new();
        execution.set_handled(true);
        execution.accept();
        execution.reset();
        assert!(!execution.is_handled());
        assert!(!execution.is_accepted());
    }
}
