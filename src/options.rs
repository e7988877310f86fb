// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The ambient, pipeline-wide configuration handle.
//!
//! Grounded on `options/seatbelt_options.rs`'s clock/telemetry bundling,
//! generalized and renamed `ResilienceOptions` to avoid colliding with the
//! per-call [`crate::context::ResilienceContext`] (see `DESIGN.md`).

use std::borrow::Cow;
use std::marker::PhantomData;

use tick::Clock;

use crate::telemetry::TelemetryHelper;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Meter, MeterProvider};

/// Shared configuration handed to [`crate::hedging::layer::HedgingLayer::new`].
/// Cheap to clone: cloning copies the clock handle and pipeline name, not
/// any per-call state.
pub struct ResilienceOptions<In, Out> {
    clock: Clock,
    pipeline_name: Cow<'static, str>,
    #[cfg(feature = "metrics")]
    meter: Option<Meter>,
    #[cfg(feature = "logs")]
    logs_enabled: bool,
    _marker: PhantomData<fn(In) -> Out>,
}

impl<In, Out> ResilienceOptions<In, Out> {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            pipeline_name: Cow::Borrowed("default"),
            #[cfg(feature = "metrics")]
            meter: None,
            #[cfg(feature = "logs")]
            logs_enabled: false,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.pipeline_name = name.into();
        self
    }

    #[must_use]
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn use_metrics(mut self, provider: impl MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::create_meter(&provider));
        self
    }

    #[cfg(feature = "logs")]
    #[must_use]
    pub const fn use_logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    pub(crate) fn create_telemetry(&self, strategy_name: &'static str) -> TelemetryHelper {
        TelemetryHelper::new(
            self.pipeline_name.clone(),
            strategy_name,
            #[cfg(feature = "metrics")]
            self.meter.as_ref(),
            #[cfg(feature = "logs")]
            self.logs_enabled,
        )
    }
}

impl<In, Out> Clone for ResilienceOptions<In, Out> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            pipeline_name: self.pipeline_name.clone(),
            #[cfg(feature = "metrics")]
            meter: self.meter.clone(),
            #[cfg(feature = "logs")]
            logs_enabled: self.logs_enabled,
            _marker: PhantomData,
        }
    }
}

impl<In, Out> std::fmt::Debug for ResilienceOptions<In, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceOptions").field("pipeline_name", &self.pipeline_name).finish_non_exhaustive()
    }
}
