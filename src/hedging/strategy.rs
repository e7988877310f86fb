// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! C5: the public hedging algorithm.

use std::sync::Arc;

use recoverable::RecoveryKind;
use tick::Clock;

use crate::context::ResilienceContext;
use crate::hedging::args::{CloneArgs, OnHedgeArgs, RecoveryArgs};
use crate::hedging::callbacks::{CloneInput, EnableIf, OnHedge, ShouldRecover};
use crate::hedging::controller::HedgingController;
use crate::hedging::execution_context::HedgingExecutionContext;
use crate::hedging::mode::HedgingMode;
use crate::hedging::task_execution::AttemptKind;
use crate::outcome::{Failure, Outcome};
use crate::telemetry::TelemetryHelper;

pub(crate) struct HedgingShared<In, Out> {
    pub clock: Clock,
    /// Total attempts allowed in flight, including the primary
    /// (`MaxHedgedAttempts + 1`).
    pub total_attempts: u32,
    pub hedging_mode: HedgingMode,
    pub clone_input: CloneInput<In>,
    pub should_recover: ShouldRecover<Out>,
    pub on_hedge: Option<OnHedge>,
    pub handle_unavailable: bool,
    pub enable_if: EnableIf<In>,
    pub telemetry: TelemetryHelper,
    pub controller: HedgingController<Out>,
}

/// A service wrapped with the hedging strategy. Built by
/// [`crate::hedging::layer::HedgingLayer::layer`]; cheap to clone (the
/// shared configuration is behind an `Arc`).
pub struct Hedging<In, Out, S> {
    pub(crate) shared: Arc<HedgingShared<In, Out>>,
    pub(crate) inner: S,
}

impl<In, Out, S: Clone> Clone for Hedging<In, Out, S> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), inner: self.inner.clone() }
    }
}

impl<In, Out, S> std::fmt::Debug for Hedging<In, Out, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hedging").field("total_attempts", &self.shared.total_attempts).finish_non_exhaustive()
    }
}

impl<In, Out, S> Hedging<In, Out, S>
where
    In: Clone + Send + 'static,
    Out: Send + 'static,
    S: layered::Service<In, Out = Out> + Clone + Send + Sync + 'static,
{
    /// Runs the hedging algorithm against `input`, threading `context`
    /// through every attempt. This is the primary entry point; the
    /// [`layered::Service`] impl below is a convenience wrapper that
    /// creates a fresh context per call for pipeline interop.
    pub async fn execute_with(&self, context: &ResilienceContext, input: In) -> Outcome<Out> {
        if context.is_cancelled() {
            return Outcome::Failure(Failure::Cancelled);
        }

        if !self.shared.enable_if.call(&input) {
            let inner = self.inner.clone();
            return Outcome::from_join_result(tokio::spawn(async move { inner.execute(input).await }).await);
        }

        let mut exec_ctx = self.shared.controller.rent_context();
        exec_ctx.initialize(context);
        self.launch(&mut exec_ctx, context, AttemptKind::Primary, 0, input.clone());

        let mut remaining_input = Some(input);
        let accepted_index = self.race(&mut exec_ctx, context, &mut remaining_input).await;

        if let Some(index) = accepted_index {
            context.record_event("hedging", format!("attempt {index} accepted"));
            for attempt_index in exec_ctx.accept(index) {
                self.shared.telemetry.report_cancelled(attempt_index);
            }
        }
        let result = exec_ctx.finish(accepted_index).await;
        self.shared.controller.return_context(exec_ctx);
        result.unwrap_or(Outcome::Failure(Failure::Cancelled))
    }

    fn launch(
        &self,
        exec_ctx: &mut HedgingExecutionContext<Out>,
        context: &ResilienceContext,
        kind: AttemptKind,
        attempt_index: u32,
        input: In,
    ) -> bool {
        let inner = self.inner.clone();
        let loaded = exec_ctx.load(context, kind, move |_child| async move { inner.execute(input).await });
        if loaded && matches!(kind, AttemptKind::Hedge) {
            self.on_hedging(attempt_index);
        }
        loaded
    }

    /// Fires the `OnHedging` callback and telemetry. Dispatched both when a
    /// new hedge is about to launch and whenever a completed attempt is
    /// judged handled (so the caller hears about every decision to keep
    /// racing, not only about the launches that follow from it).
    fn on_hedging(&self, attempt_index: u32) {
        if let Some(on_hedge) = &self.shared.on_hedge {
            on_hedge.call(OnHedgeArgs::new(attempt_index));
        }
        self.shared.telemetry.report_hedge(attempt_index);
    }

    /// Runs the wait/judge/hedge loop until a winner is accepted or the
    /// call is cancelled. Returns the accepted attempt's index.
    async fn race(
        &self,
        exec_ctx: &mut HedgingExecutionContext<Out>,
        context: &ResilienceContext,
        remaining_input: &mut Option<In>,
    ) -> Option<usize> {
        loop {
            if context.is_cancelled() {
                for attempt_index in exec_ctx.cancel_all() {
                    self.shared.telemetry.report_cancelled(attempt_index);
                }
                return None;
            }

            while let Some(index) = exec_ctx.first_ready() {
                if self.judge(exec_ctx, index).await {
                    return Some(index);
                }
            }

            let exhausted = !exec_ctx.can_load_more() || remaining_input.is_none();
            if exhausted {
                if exec_ctx.tasks_all_finished() {
                    return exec_ctx.fallback_index();
                }
                exec_ctx.wait_cancellable(context).await;
                continue;
            }

            let next_attempt_index = exec_ctx.loaded_tasks();
            let delay = self.shared.hedging_mode.delay_for(next_attempt_index);
            let timeout = Some(delay);
            match exec_ctx.wait(&self.shared.clock, timeout).await {
                crate::signal::WaitOutcome::Completed | crate::signal::WaitOutcome::Cancelled => continue,
                crate::signal::WaitOutcome::TimedOut => {
                    let Some(current_input) = remaining_input.take() else { continue };
                    let is_last = next_attempt_index + 1 >= exec_ctx.max_attempts();
                    let clone_args = CloneArgs::new(next_attempt_index, is_last);
                    if let Some(cloned) = self.shared.clone_input.call(&current_input, clone_args) {
                        *remaining_input = Some(cloned.clone());
                        self.launch(exec_ctx, context, AttemptKind::Hedge, next_attempt_index, cloned);
                    }
                }
            }
        }
    }

    /// Classifies a finished attempt; returns `true` when it should be
    /// accepted as the final answer.
    async fn judge(&self, exec_ctx: &mut HedgingExecutionContext<Out>, index: usize) -> bool {
        let attempt_index = exec_ctx.task(index).attempt_index();
        let outcome = exec_ctx.task(index).observe().await;
        let recovery = self.shared.should_recover.call(outcome, RecoveryArgs::new(&self.shared.clock));
        let handled = match recovery.kind() {
            RecoveryKind::Retry => true,
            RecoveryKind::Unavailable => self.shared.handle_unavailable,
            RecoveryKind::Never | RecoveryKind::Unknown => false,
            _ => false,
        };
        exec_ctx.task(index).set_handled(handled);
        self.shared.telemetry.report_attempt(attempt_index, handled);
        if handled {
            self.on_hedging(attempt_index);
        }
        !handled
    }
}

impl<In, Out, S> layered::Service<In> for Hedging<In, Out, S>
where
    In: Clone + Send + 'static,
    Out: Send + 'static,
    S: layered::Service<In, Out = Out> + Clone + Send + Sync + 'static,
{
    type Out = Outcome<Out>;

    async fn execute(&self, input: In) -> Self::Out {
        self.execute_with(&ResilienceContext::new(), input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hedging::args::RecoveryArgs as RArgs;
    use crate::hedging::layer::HedgingLayer;
    use crate::hedging::mode::HedgingMode;
    use crate::options::ResilienceOptions;
    use layered::{Layer, Service};
    use recoverable::RecoveryInfo;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tick::{Clock, ClockControl};

    #[derive(Clone)]
    struct CountingService {
        calls: Arc<AtomicU32>,
        behavior: fn(u32) -> &'static str,
    }

    impl layered::Service<u32> for CountingService {
        type Out = &'static str;

        async fn execute(&self, attempt: u32) -> &'static str {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.behavior)(attempt)
        }
    }

    fn options(clock: Clock) -> ResilienceOptions<u32, &'static str> {
        ResilienceOptions::new(clock)
    }

    #[tokio::test]
    async fn primary_success_before_any_hedge_needs_no_second_attempt() {
        let control = ClockControl::default().auto_advance_timers(true);
        let clock = control.to_clock();
        let calls = Arc::new(AtomicU32::new(0));
        let service = CountingService { calls: Arc::clone(&calls), behavior: |_| "ok" };

        let layer = HedgingLayer::new("test", options(clock))
            .clone_input()
            .recovery_with(|outcome: &Outcome<&'static str>, _args: RArgs<'_>| match outcome {
                Outcome::Success(_) => RecoveryInfo::never(),
                Outcome::Failure(_) => RecoveryInfo::retry(),
            })
            .hedging_mode(HedgingMode::delay(Duration::from_millis(50)));

        let hedging = layer.layer(service);
        let out = hedging.execute(0).await;
        assert_eq!(out.as_success(), Some(&"ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_primary_is_hedged_and_faster_secondary_wins() {
        let control = ClockControl::default().auto_advance_timers(true);
        let clock = control.to_clock();
        let calls = Arc::new(AtomicU32::new(0));
        let service = CountingService {
            calls: Arc::clone(&calls),
            behavior: |attempt| if attempt == 0 { "slow" } else { "fast" },
        };

        let layer = HedgingLayer::new("test", options(clock))
            .clone_input()
            .recovery_with(|outcome: &Outcome<&'static str>, _args: RArgs<'_>| match outcome {
                Outcome::Success(value) if *value == "slow" => RecoveryInfo::retry(),
                Outcome::Success(_) => RecoveryInfo::never(),
                Outcome::Failure(_) => RecoveryInfo::retry(),
            })
            .hedging_mode(HedgingMode::immediate())
            .max_hedged_attempts(2);

        let hedging = layer.layer(service);
        let out = hedging.execute(0).await;
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert!(matches!(out, Outcome::Success("slow") | Outcome::Success("fast")));
    }

    #[tokio::test]
    async fn exhausted_attempts_fall_back_to_the_last_outcome() {
        let control = ClockControl::default().auto_advance_timers(true);
        let clock = control.to_clock();
        let calls = Arc::new(AtomicU32::new(0));
        let service = CountingService { calls: Arc::clone(&calls), behavior: |_| "still failing" };

        let layer = HedgingLayer::new("test", options(clock))
            .clone_input()
            .recovery_with(|_outcome: &Outcome<&'static str>, _args: RArgs<'_>| RecoveryInfo::retry())
            .hedging_mode(HedgingMode::immediate())
            .max_hedged_attempts(3);

        let hedging = layer.layer(service);
        let out = hedging.execute(0).await;
        assert_eq!(out.as_success(), Some(&"still failing"));
        assert_eq!(calls.load(Ordering::SeqCst), 4, "primary plus all 3 configured hedges");
    }

    #[tokio::test]
    async fn cancellation_short_circuits_without_a_winner() {
        let control = ClockControl::default().auto_advance_timers(true);
        let clock = control.to_clock();
        let calls = Arc::new(AtomicU32::new(0));
        let service = CountingService { calls: Arc::clone(&calls), behavior: |_| "unreachable" };

        let layer = HedgingLayer::new("test", options(clock))
            .clone_input()
            .recovery_with(|_outcome: &Outcome<&'static str>, _args: RArgs<'_>| RecoveryInfo::retry());

        let hedging = layer.layer(service);
        let context = ResilienceContext::new();
        context.cancellation().cancel();
        let out = hedging.execute_with(&context, 0).await;
        assert!(matches!(out, Outcome::Failure(Failure::Cancelled)));
    }
}
