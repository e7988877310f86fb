// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! C3: per-call coordinator owning the set of racing attempts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use crate::context::{ContextSnapshot, PropertyBag, ResilienceContext};
use crate::hedging::task_execution::{AttemptKind, TaskExecution};
use crate::outcome::Outcome;
use crate::pool::Pool;
use crate::signal::{CompletedSignal, WaitCancellable, WaitOutcome, WaitWithTimeout};

/// Coordinates one call's worth of racing attempts: loads them, waits for
/// the first to finish (with a timeout so the next hedge can be launched),
/// and restores the parent context once a winner is decided.
pub(crate) struct HedgingExecutionContext<Out> {
    pool: Arc<Pool<TaskExecution<Out>>>,
    tasks: Vec<TaskExecution<Out>>,
    max_attempts: u32,
    signal: CompletedSignal,
    snapshot: Option<ContextSnapshot>,
}

impl<Out: Send + 'static> HedgingExecutionContext<Out> {
    pub fn new(pool: Arc<Pool<TaskExecution<Out>>>, max_attempts: u32) -> Self {
        Self { pool, tasks: Vec::new(), max_attempts, signal: CompletedSignal::new(), snapshot: None }
    }

    pub fn initialize(&mut self, parent: &ResilienceContext) {
        debug_assert!(self.tasks.is_empty(), "execution context reused without being finished");
        self.snapshot = Some(ContextSnapshot::capture(parent));
        self.signal = CompletedSignal::new();
    }

    pub fn loaded_tasks(&self) -> u32 {
        u32::try_from(self.tasks.len()).unwrap_or(u32::MAX)
    }

    pub fn can_load_more(&self) -> bool {
        self.loaded_tasks() < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Rents a slot from the pool, gives it an isolated child of `parent`,
    /// and spawns `build(child_context)`. Returns `false` without doing
    /// anything if `max_attempts` has already been reached.
    pub fn load<Fut>(
        &mut self,
        parent: &ResilienceContext,
        kind: AttemptKind,
        build: impl FnOnce(ResilienceContext) -> Fut,
    ) -> bool
    where
        Fut: Future<Output = Out> + Send + 'static,
    {
        if !self.can_load_more() {
            return false;
        }
        let attempt_index = self.loaded_tasks();
        let mut execution = self.pool.rent();
        execution.reset();

        let context = parent.child();
        context.record_event("hedging", format!("attempt {attempt_index} launched ({kind:?})"));
        let signal = self.signal.clone();
        let future = build(context.clone());
        let notifying = async move {
            let result = future.await;
            signal.notify();
            result
        };

        execution.start(attempt_index, kind, context, notifying);
        self.tasks.push(execution);
        true
    }

    /// The first loaded attempt that has finished but not yet been judged,
    /// if any. Checked before and after waiting so a completion that raced
    /// ahead of the wait is never missed.
    pub fn first_ready(&self) -> Option<usize> {
        self.tasks.iter().position(|task| task.is_finished() && !task.is_judged())
    }

    pub fn task(&mut self, index: usize) -> &mut TaskExecution<Out> {
        &mut self.tasks[index]
    }

    pub fn tasks_all_finished(&self) -> bool {
        self.tasks.iter().all(TaskExecution::is_finished)
    }

    /// The most recently launched attempt, used as the last-resort answer
    /// once no further hedges can be launched and every loaded attempt has
    /// finished (even if every one of them was classified as handled).
    pub fn fallback_index(&self) -> Option<usize> {
        self.tasks.iter().enumerate().max_by_key(|(_, task)| task.attempt_index()).map(|(index, _)| index)
    }

    /// Waits for the next completion, or `timeout` elapsing, whichever
    /// comes first. `None` waits with no deadline at all (used once no
    /// further hedges remain to launch).
    pub fn wait(&self, clock: &Clock, timeout: Option<Duration>) -> impl Future<Output = WaitOutcome> + '_ {
        let since = self.signal.generation();
        WaitWithTimeout::new(&self.signal, since, clock, timeout)
    }

    /// Waits for the next completion, or `context`'s cancellation token
    /// firing, whichever comes first. Used once no further hedges remain to
    /// launch: an unbounded wait with no timeout still needs to notice the
    /// caller cancelling the call while every loaded attempt is in flight.
    pub fn wait_cancellable(&self, context: &ResilienceContext) -> impl Future<Output = WaitOutcome> + '_ {
        let since = self.signal.generation();
        WaitCancellable::new(&self.signal, since, context.cancellation())
    }

    /// Marks `index` as the accepted winner and cancels every other loaded
    /// attempt. Returns the attempt indices that were cancelled, for the
    /// caller to report.
    pub fn accept(&mut self, index: usize) -> Vec<u32> {
        let mut cancelled = Vec::new();
        for (i, task) in self.tasks.iter_mut().enumerate() {
            if i == index {
                task.accept();
            } else {
                cancelled.push(task.attempt_index());
                task.cancel();
            }
        }
        cancelled
    }

    /// Cancels every loaded attempt without accepting any of them (used
    /// when the call itself is cancelled). Returns the cancelled attempt
    /// indices, for the caller to report.
    pub fn cancel_all(&mut self) -> Vec<u32> {
        for task in &self.tasks {
            task.cancel();
        }
        self.tasks.iter().map(TaskExecution::attempt_index).collect()
    }

    /// Restores the parent context's property bag, returns every loaded
    /// slot to the pool, and hands back the accepted attempt's outcome (if
    /// any attempt was accepted).
    pub async fn finish(&mut self, accepted_index: Option<usize>) -> Option<Outcome<Out>> {
        let mut accepted = None;
        let mut accepted_outcome = None;

        for (index, mut task) in self.tasks.drain(..).enumerate() {
            if Some(index) == accepted_index {
                task.observe().await;
                let properties = task.context().with_properties(PropertyBag::clone);
                accepted = Some((properties, task.context().events()));
                accepted_outcome = task.take_outcome();
            } else {
                task.quiesce().await;
            }
            task.reset();
            self.pool.give_back(task);
        }

        let snapshot = self.snapshot.take().expect("finish called without a matching initialize");
        snapshot.restore(accepted);
        accepted_outcome
    }
}
