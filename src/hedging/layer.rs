// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The typestate builder for configuring a hedging strategy.
//!
//! Only the fully configured state (`clone_input` and `recovery` both set)
//! implements [`layered::Layer`], so a pipeline cannot be built from a
//! misconfigured hedging layer — the mistake is caught at compile time.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use recoverable::Recovery;

use crate::hedging::args::CloneArgs;
use crate::hedging::callbacks::{CloneInput, EnableIf, OnHedge, ShouldRecover};
use crate::hedging::controller::HedgingController;
use crate::hedging::mode::HedgingMode;
use crate::hedging::strategy::{Hedging, HedgingShared};
use crate::options::ResilienceOptions;
use crate::outcome::Outcome;

/// Marker: a required field has not been configured yet.
#[derive(Debug)]
#[non_exhaustive]
pub struct NotSet;

/// Marker: a required field has been configured.
#[derive(Debug)]
#[non_exhaustive]
pub struct Set;

const DEFAULT_MAX_HEDGED_ATTEMPTS: u32 = 2;
const DEFAULT_POOL_CAPACITY: usize = 16;

pub struct HedgingLayer<In, Out, S1 = NotSet, S2 = NotSet> {
    options: ResilienceOptions<In, Out>,
    max_hedged_attempts: u32,
    pool_capacity: usize,
    hedging_mode: HedgingMode,
    clone_input: Option<CloneInput<In>>,
    should_recover: Option<ShouldRecover<Out>>,
    on_hedge: Option<OnHedge>,
    handle_unavailable: bool,
    enable_if: EnableIf<In>,
    strategy_name: &'static str,
    _state: PhantomData<fn(In, S1, S2) -> Out>,
}

impl<In, Out> HedgingLayer<In, Out, NotSet, NotSet> {
    pub fn new(name: &'static str, options: ResilienceOptions<In, Out>) -> Self {
        Self {
            options,
            max_hedged_attempts: DEFAULT_MAX_HEDGED_ATTEMPTS,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            hedging_mode: HedgingMode::default(),
            clone_input: None,
            should_recover: None,
            on_hedge: None,
            handle_unavailable: false,
            enable_if: EnableIf::always(),
            strategy_name: name,
            _state: PhantomData,
        }
    }
}

impl<In, Out, S1, S2> HedgingLayer<In, Out, S1, S2> {
    fn into_state<T1, T2>(self) -> HedgingLayer<In, Out, T1, T2> {
        HedgingLayer {
            options: self.options,
            max_hedged_attempts: self.max_hedged_attempts,
            pool_capacity: self.pool_capacity,
            hedging_mode: self.hedging_mode,
            clone_input: self.clone_input,
            should_recover: self.should_recover,
            on_hedge: self.on_hedge,
            handle_unavailable: self.handle_unavailable,
            enable_if: self.enable_if,
            strategy_name: self.strategy_name,
            _state: PhantomData,
        }
    }

    /// Caps the number of extra attempts launched alongside the primary.
    /// `0` disables hedging entirely: the strategy then runs exactly the
    /// primary attempt.
    #[must_use]
    pub fn max_hedged_attempts(mut self, max_hedged_attempts: u32) -> Self {
        self.max_hedged_attempts = max_hedged_attempts;
        self
    }

    /// Capacity of the internal execution-context/attempt pools. Tune this
    /// up for pipelines driven at high concurrency; the default is generous
    /// for typical use.
    #[must_use]
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn hedging_mode(mut self, mode: HedgingMode) -> Self {
        self.hedging_mode = mode;
        self
    }

    #[must_use]
    pub fn on_hedge(mut self, f: impl Fn(crate::hedging::args::OnHedgeArgs) + Send + Sync + 'static) -> Self {
        self.on_hedge = Some(OnHedge::new(f));
        self
    }

    /// When `true`, an outcome classified `RecoveryInfo::unavailable()` is
    /// treated as recoverable (worth hedging against). When `false` (the
    /// default) it is returned immediately, since "unavailable" typically
    /// means hedging would only pile more load onto an already-struggling
    /// dependency.
    #[must_use]
    pub const fn handle_unavailable(mut self, handle_unavailable: bool) -> Self {
        self.handle_unavailable = handle_unavailable;
        self
    }

    #[must_use]
    pub fn enable_if(mut self, f: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(f);
        self
    }

    #[must_use]
    pub fn enable_always(mut self) -> Self {
        self.enable_if = EnableIf::always();
        self
    }

    #[must_use]
    pub fn disable(mut self) -> Self {
        self.enable_if = EnableIf::never();
        self
    }

    #[must_use]
    pub fn try_clone_with(
        self,
        f: impl Fn(&In, CloneArgs) -> Option<In> + Send + Sync + 'static,
    ) -> HedgingLayer<In, Out, Set, S2> {
        let clone_input = Some(CloneInput::new(f));
        let mut next = self.into_state::<Set, S2>();
        next.clone_input = clone_input;
        next
    }

    #[must_use]
    pub fn recovery_with(
        self,
        f: impl Fn(&Outcome<Out>, crate::hedging::args::RecoveryArgs<'_>) -> recoverable::RecoveryInfo + Send + Sync + 'static,
    ) -> HedgingLayer<In, Out, S1, Set> {
        let should_recover = Some(ShouldRecover::new(f));
        let mut next = self.into_state::<S1, Set>();
        next.should_recover = should_recover;
        next
    }
}

impl<In, Out, S2> HedgingLayer<In, Out, NotSet, S2>
where
    In: Clone + Send + Sync + 'static,
{
    /// Clones the input with `In::clone`, ignoring [`CloneArgs`].
    #[must_use]
    pub fn clone_input(self) -> HedgingLayer<In, Out, Set, S2> {
        self.try_clone_with(|input, _args| Some(input.clone()))
    }
}

impl<In, Out, S1> HedgingLayer<In, Out, S1, NotSet>
where
    Out: Recovery + Send + Sync + 'static,
{
    /// Classifies outcomes with `Out`'s own [`Recovery`] implementation.
    #[must_use]
    pub fn recovery(self) -> HedgingLayer<In, Out, S1, Set> {
        self.recovery_with(|outcome, _args| outcome.recovery())
    }
}

impl<In, Out, S> layered::Layer<S> for HedgingLayer<In, Out, Set, Set>
where
    In: Clone + Send + 'static,
    Out: Send + 'static,
{
    type Service = Hedging<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let telemetry = self.options.create_telemetry(self.strategy_name);
        // TotalAttempts = MaxHedgedAttempts + 1 (the primary attempt is not
        // counted against the configured hedge budget).
        let total_attempts = self.max_hedged_attempts.saturating_add(1);
        let shared = HedgingShared {
            clock: self.options.clock().clone(),
            total_attempts,
            hedging_mode: self.hedging_mode.clone(),
            clone_input: self.clone_input.clone().expect("Set state guarantees this is populated"),
            should_recover: self.should_recover.clone().expect("Set state guarantees this is populated"),
            on_hedge: self.on_hedge.clone(),
            handle_unavailable: self.handle_unavailable,
            enable_if: self.enable_if.clone(),
            telemetry,
            controller: HedgingController::new(total_attempts, self.pool_capacity),
        };
        Hedging { shared: Arc::new(shared), inner }
    }
}

impl<In, Out, S1, S2> std::fmt::Debug for HedgingLayer<In, Out, S1, S2> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgingLayer")
            .field("strategy_name", &self.strategy_name)
            .field("max_hedged_attempts", &self.max_hedged_attempts)
            .field("hedging_mode", &self.hedging_mode)
            .field("handle_unavailable", &self.handle_unavailable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{HedgingLayer, NotSet, Set};
    use crate::options::ResilienceOptions;
    use static_assertions::{assert_impl_all, assert_not_impl_all};
    use tick::Clock;

    fn options() -> ResilienceOptions<String, String> {
        ResilienceOptions::new(Clock::new_frozen())
    }

    #[test]
    fn configuring_both_required_fields_unlocks_the_builder() {
        let _layer: HedgingLayer<String, String, Set, Set> = HedgingLayer::new("test", options())
            .clone_input()
            .recovery_with(|_outcome, _args| recoverable::RecoveryInfo::retry());
    }

    assert_not_impl_all!(HedgingLayer<String, String, NotSet, NotSet>: layered::Layer<()>);
    assert_not_impl_all!(HedgingLayer<String, String, Set, NotSet>: layered::Layer<()>);
    assert_not_impl_all!(HedgingLayer<String, String, NotSet, Set>: layered::Layer<()>);
    assert_impl_all!(HedgingLayer<String, String, Set, Set>: std::fmt::Debug);
}
