// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging and metrics emission for a single strategy instance.
//!
//! Grounded on the call sites that use a `TelemetryHelper` throughout the
//! teacher crate (`telemetry.metrics_enabled()`, `telemetry.report_*`) —
//! no `impl TelemetryHelper` exists anywhere in that crate's own source, so
//! this one is written from scratch against those call shapes, plus the
//! attribute names in `utils/attributes.rs` and the counter shape in
//! `telemetry/metrics.rs`.

use std::borrow::Cow;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Meter, MeterProvider};
#[cfg(feature = "metrics")]
use opentelemetry::KeyValue;

pub(crate) const PIPELINE_NAME: &str = "resilience.pipeline.name";
pub(crate) const STRATEGY_NAME: &str = "resilience.strategy.name";
pub(crate) const EVENT_NAME: &str = "resilience.event.name";
pub(crate) const ATTEMPT_INDEX: &str = "resilience.attempt.index";

#[cfg(feature = "metrics")]
pub(crate) fn create_meter(provider: &dyn MeterProvider) -> Meter {
    provider.meter("ricochet")
}

#[cfg(feature = "metrics")]
fn create_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("resilience.event")
        .with_description("Emitted upon the occurrence of a resilience event.")
        .build()
}

pub(crate) struct TelemetryHelper {
    pipeline_name: Cow<'static, str>,
    strategy_name: &'static str,
    #[cfg(feature = "metrics")]
    event_counter: Option<Counter<u64>>,
    #[cfg(feature = "logs")]
    logs_enabled: bool,
}

impl TelemetryHelper {
    pub fn new(
        pipeline_name: Cow<'static, str>,
        strategy_name: &'static str,
        #[cfg(feature = "metrics")] meter: Option<&Meter>,
        #[cfg(feature = "logs")] logs_enabled: bool,
    ) -> Self {
        Self {
            pipeline_name,
            strategy_name,
            #[cfg(feature = "metrics")]
            event_counter: meter.map(create_event_counter),
            #[cfg(feature = "logs")]
            logs_enabled,
        }
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables, clippy::unused_self))]
    fn emit_metric(&self, event_name: &'static str, attempt_index: u32) {
        #[cfg(feature = "metrics")]
        if let Some(counter) = &self.event_counter {
            counter.add(
                1,
                &[
                    KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone().into_owned()),
                    KeyValue::new(STRATEGY_NAME, self.strategy_name),
                    KeyValue::new(EVENT_NAME, event_name),
                    KeyValue::new(ATTEMPT_INDEX, i64::from(attempt_index)),
                ],
            );
        }
    }

    #[cfg_attr(not(feature = "logs"), allow(unused_variables, clippy::unused_self))]
    fn emit_log(&self, attempt_index: u32, handled: bool) {
        #[cfg(feature = "logs")]
        if self.logs_enabled {
            tracing::info!(
                pipeline.name = %self.pipeline_name,
                strategy.name = self.strategy_name,
                attempt.index = attempt_index,
                handled,
                "hedging attempt observed",
            );
        }
    }

    /// One event per `OnHedging` invocation: severity Warning, name
    /// `"OnHedging"`.
    #[cfg_attr(not(feature = "logs"), allow(unused_variables, clippy::unused_self))]
    fn emit_on_hedging(&self, attempt_index: u32) {
        #[cfg(feature = "logs")]
        if self.logs_enabled {
            tracing::warn!(
                pipeline.name = %self.pipeline_name,
                strategy.name = self.strategy_name,
                resilience.event.name = "OnHedging",
                attempt.index = attempt_index,
                "OnHedging",
            );
        }
    }

    #[cfg_attr(not(feature = "logs"), allow(unused_variables, clippy::unused_self))]
    fn emit_cancelled(&self, attempt_index: u32) {
        #[cfg(feature = "logs")]
        if self.logs_enabled {
            tracing::warn!(
                pipeline.name = %self.pipeline_name,
                strategy.name = self.strategy_name,
                attempt.index = attempt_index,
                "hedging attempt aborted by cancellation",
            );
        }
    }

    pub fn report_hedge(&self, attempt_index: u32) {
        self.emit_metric("hedge", attempt_index);
        self.emit_on_hedging(attempt_index);
    }

    pub fn report_attempt(&self, attempt_index: u32, handled: bool) {
        self.emit_log(attempt_index, handled);
    }

    /// Reports an attempt aborted as a result of cancellation: either it
    /// lost the race to the accepted winner, or the call itself was
    /// cancelled.
    pub fn report_cancelled(&self, attempt_index: u32) {
        self.emit_cancelled(attempt_index);
    }
}

impl std::fmt::Debug for TelemetryHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryHelper")
            .field("pipeline_name", &self.pipeline_name)
            .field("strategy_name", &self.strategy_name)
            .finish_non_exhaustive()
    }
}
