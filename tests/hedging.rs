// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests driving the hedging strategy entirely through its
//! public API, the way a consumer of the crate would.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use layered::{Layer, Service};
use recoverable::RecoveryInfo;
use ricochet::{Failure, HedgingLayer, HedgingMode, Outcome, ResilienceContext, ResilienceOptions};
use tick::{Clock, ClockControl};

#[derive(Clone)]
struct Scripted {
    calls: Arc<AtomicU32>,
    responses: Arc<Vec<&'static str>>,
}

impl Scripted {
    fn new(responses: &[&'static str]) -> Self {
        Self { calls: Arc::new(AtomicU32::new(0)), responses: Arc::new(responses.to_vec()) }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl layered::Service<u32> for Scripted {
    type Out = &'static str;

    async fn execute(&self, attempt: u32) -> &'static str {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses.get(attempt as usize).or_else(|| self.responses.last()).copied().unwrap_or_else(|| {
            panic!("no scripted response for attempt {attempt} (call #{call})")
        })
    }
}

fn succeed_unless(marker: &'static str) -> impl Fn(&Outcome<&'static str>, ricochet::RecoveryArgs<'_>) -> RecoveryInfo + Send + Sync + 'static {
    move |outcome, _args| match outcome {
        Outcome::Success(value) if *value == marker => RecoveryInfo::retry(),
        Outcome::Success(_) => RecoveryInfo::never(),
        Outcome::Failure(_) => RecoveryInfo::retry(),
    }
}

fn options(clock: Clock) -> ResilienceOptions<u32, &'static str> {
    ResilienceOptions::new(clock).name("hedging-integration")
}

#[tokio::test]
async fn primary_succeeds_before_any_hedging_delay_elapses() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let service = Scripted::new(&["good"]);
    let calls = service.clone();

    let layer = HedgingLayer::new("primary-fast", options(clock))
        .clone_input()
        .recovery_with(succeed_unless("never matches"))
        .hedging_mode(HedgingMode::delay(Duration::from_secs(5)));

    let hedging = layer.layer(service);
    let outcome = hedging.execute(0).await;

    assert_eq!(outcome.as_success(), Some(&"good"));
    assert_eq!(calls.call_count(), 1, "no hedge should have been launched");
}

#[tokio::test]
async fn slow_primary_is_overtaken_by_a_faster_hedge() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let service = Scripted::new(&["slow", "fast"]);

    let layer = HedgingLayer::new("overtaken", options(clock))
        .clone_input()
        .recovery_with(succeed_unless("slow"))
        .hedging_mode(HedgingMode::immediate())
        .max_hedged_attempts(2);

    let hedging = layer.layer(service);
    let outcome = hedging.execute(0).await;

    assert_eq!(outcome.as_success(), Some(&"fast"));
}

#[tokio::test]
async fn every_attempt_handled_falls_back_to_the_final_one() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let service = Scripted::new(&["bad", "bad", "bad", "bad"]);
    let calls = service.clone();

    let layer = HedgingLayer::new("exhausted", options(clock))
        .clone_input()
        .recovery_with(|_outcome: &Outcome<&'static str>, _args| RecoveryInfo::retry())
        .hedging_mode(HedgingMode::immediate())
        .max_hedged_attempts(3);

    let hedging = layer.layer(service);
    let outcome = hedging.execute(0).await;

    assert_eq!(outcome.as_success(), Some(&"bad"));
    assert_eq!(calls.call_count(), 4, "should have exhausted the primary plus every configured hedge");
}

#[tokio::test]
async fn cancelling_the_context_before_the_call_returns_cancelled_without_calling_the_service() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let service = Scripted::new(&["unreachable"]);
    let calls = service.clone();

    let layer = HedgingLayer::new("cancelled", options(clock)).clone_input().recovery_with(succeed_unless("x"));

    let hedging = layer.layer(service);
    let context = ResilienceContext::new();
    context.cancellation().cancel();

    let outcome = hedging.execute_with(&context, 0).await;

    assert!(matches!(outcome, Outcome::Failure(Failure::Cancelled)));
    assert_eq!(calls.call_count(), 0);
}

#[tokio::test]
async fn cancelling_mid_flight_returns_cancelled_instead_of_hanging() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();

    #[derive(Clone)]
    struct Never;

    impl layered::Service<u32> for Never {
        type Out = &'static str;

        async fn execute(&self, _input: u32) -> &'static str {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    let layer = HedgingLayer::new("mid-flight-cancel", options(clock)).clone_input().recovery_with(succeed_unless("x")).max_hedged_attempts(0);

    let hedging = layer.layer(Never);
    let context = ResilienceContext::new();
    let cancel_after_launch = context.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        cancel_after_launch.cancellation().cancel();
    });

    let outcome = hedging.execute_with(&context, 0).await;
    assert!(matches!(outcome, Outcome::Failure(Failure::Cancelled)));
}

#[tokio::test]
async fn generator_exhaustion_with_attempts_still_in_flight_waits_for_the_survivor() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let service = Scripted::new(&["bad", "bad", "good"]);

    let layer = HedgingLayer::new("live-attempts", options(clock))
        .clone_input()
        .recovery_with(succeed_unless("bad"))
        .hedging_mode(HedgingMode::immediate())
        .max_hedged_attempts(3);

    let hedging = layer.layer(service);
    let outcome = hedging.execute(0).await;

    assert_eq!(outcome.as_success(), Some(&"good"));
}

#[tokio::test]
async fn dynamic_delay_generator_is_consulted_once_per_hedge() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let service = Scripted::new(&["slow", "slow", "done"]);
    let generator_calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&generator_calls);

    let layer = HedgingLayer::new("dynamic-delay", options(clock))
        .clone_input()
        .recovery_with(succeed_unless("slow"))
        .hedging_mode(HedgingMode::dynamic(move |args| {
            counted.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(u64::from(args.attempt_index()))
        }))
        .max_hedged_attempts(3);

    let hedging = layer.layer(service);
    let outcome = hedging.execute(0).await;

    assert_eq!(outcome.as_success(), Some(&"done"));
    assert!(generator_calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn disabled_hedging_runs_the_service_exactly_once() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let service = Scripted::new(&["only"]);
    let calls = service.clone();

    let layer = HedgingLayer::new("disabled", options(clock)).clone_input().recovery_with(succeed_unless("x")).disable();

    let hedging = layer.layer(service);
    let outcome = hedging.execute(0).await;

    assert_eq!(outcome.as_success(), Some(&"only"));
    assert_eq!(calls.call_count(), 1);
}
