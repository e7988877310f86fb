// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! How long to wait before launching the next hedge.

use std::fmt;
use std::time::Duration;

use crate::hedging::args::HedgingDelayArgs;
use crate::hedging::callbacks::DelayFn;

const DEFAULT_HEDGING_DELAY: Duration = Duration::from_millis(250);

#[derive(Clone)]
enum HedgingModeInner {
    /// Launch the next attempt as soon as the previous one is in flight,
    /// without waiting at all.
    Immediate,
    /// Wait a fixed duration between attempts.
    Delay(Duration),
    /// Ask a callback for the delay before each attempt.
    Dynamic(DelayFn),
}

#[derive(Clone)]
pub struct HedgingMode {
    inner: HedgingModeInner,
}

impl HedgingMode {
    #[must_use]
    pub const fn immediate() -> Self {
        Self { inner: HedgingModeInner::Immediate }
    }

    #[must_use]
    pub const fn delay(duration: Duration) -> Self {
        Self { inner: HedgingModeInner::Delay(duration) }
    }

    pub fn dynamic(f: impl Fn(HedgingDelayArgs) -> Duration + Send + Sync + 'static) -> Self {
        Self { inner: HedgingModeInner::Dynamic(DelayFn::new(f)) }
    }

    pub(crate) fn delay_for(&self, attempt_index: u32) -> Duration {
        match &self.inner {
            HedgingModeInner::Immediate => Duration::ZERO,
            HedgingModeInner::Delay(duration) => *duration,
            HedgingModeInner::Dynamic(f) => f.call(HedgingDelayArgs::new(attempt_index)),
        }
    }

    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        matches!(self.inner, HedgingModeInner::Immediate)
    }
}

impl Default for HedgingMode {
    fn default() -> Self {
        Self::delay(DEFAULT_HEDGING_DELAY)
    }
}

impl fmt::Debug for HedgingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            HedgingModeInner::Immediate => f.write_str("HedgingMode::Immediate"),
            HedgingModeInner::Delay(duration) => f.debug_tuple("HedgingMode::Delay").field(duration).finish(),
            HedgingModeInner::Dynamic(_) => f.write_str("HedgingMode::Dynamic(..)"),
        }
    }
}
