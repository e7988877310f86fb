// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Argument bundles passed into the hedging callbacks.

use tick::Clock;

/// Passed to the clone callback when deciding whether (and how) to produce
/// the input for another attempt.
#[derive(Debug, Clone, Copy)]
pub struct CloneArgs {
    attempt_index: u32,
    is_last: bool,
}

impl CloneArgs {
    pub(crate) const fn new(attempt_index: u32, is_last: bool) -> Self {
        Self { attempt_index, is_last }
    }

    /// Zero-based index of the attempt about to be launched.
    #[must_use]
    pub const fn attempt_index(&self) -> u32 {
        self.attempt_index
    }

    /// `true` when this is the last attempt the strategy is configured to
    /// launch (`max_hedged_attempts` reached).
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.is_last
    }
}

/// Passed to the recovery callback alongside the outcome being classified.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryArgs<'a> {
    clock: &'a Clock,
}

impl<'a> RecoveryArgs<'a> {
    pub(crate) const fn new(clock: &'a Clock) -> Self {
        Self { clock }
    }

    #[must_use]
    pub const fn clock(&self) -> &Clock {
        self.clock
    }
}

/// Passed to the `on_hedge` callback each time an extra attempt is
/// launched (never for the primary attempt).
#[derive(Debug, Clone, Copy)]
pub struct OnHedgeArgs {
    attempt_index: u32,
}

impl OnHedgeArgs {
    pub(crate) const fn new(attempt_index: u32) -> Self {
        Self { attempt_index }
    }

    #[must_use]
    pub const fn attempt_index(&self) -> u32 {
        self.attempt_index
    }
}

/// Passed to a dynamic hedging delay generator.
#[derive(Debug, Clone, Copy)]
pub struct HedgingDelayArgs {
    attempt_index: u32,
}

impl HedgingDelayArgs {
    pub(crate) const fn new(attempt_index: u32) -> Self {
        Self { attempt_index }
    }

    #[must_use]
    pub const fn attempt_index(&self) -> u32 {
        self.attempt_index
    }
}
