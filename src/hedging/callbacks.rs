// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `Arc<dyn Fn>` wrappers for the hedging layer's configurable callbacks.
//!
//! Each wraps a boxed closure behind a small named type so the builder's
//! method signatures (and its `Debug` impl) stay readable instead of
//! spelling out `Arc<dyn Fn(...) -> ... + Send + Sync>` everywhere.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::hedging::args::{CloneArgs, HedgingDelayArgs, OnHedgeArgs, RecoveryArgs};
use crate::outcome::Outcome;
use recoverable::RecoveryInfo;

#[derive(Clone)]
pub(crate) struct CloneInput<In>(Arc<dyn Fn(&In, CloneArgs) -> Option<In> + Send + Sync>);

impl<In> CloneInput<In> {
    pub fn new(f: impl Fn(&In, CloneArgs) -> Option<In> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, input: &In, args: CloneArgs) -> Option<In> {
        (self.0)(input, args)
    }
}

impl<In> fmt::Debug for CloneInput<In> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CloneInput")
    }
}

pub(crate) struct ShouldRecover<Out>(Arc<dyn Fn(&Outcome<Out>, RecoveryArgs<'_>) -> RecoveryInfo + Send + Sync>);

impl<Out> Clone for ShouldRecover<Out> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<Out> ShouldRecover<Out> {
    pub fn new(f: impl Fn(&Outcome<Out>, RecoveryArgs<'_>) -> RecoveryInfo + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, outcome: &Outcome<Out>, args: RecoveryArgs<'_>) -> RecoveryInfo {
        (self.0)(outcome, args)
    }
}

impl<Out> fmt::Debug for ShouldRecover<Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShouldRecover")
    }
}

#[derive(Clone)]
pub(crate) struct EnableIf<In>(Arc<dyn Fn(&In) -> bool + Send + Sync>);

impl<In> EnableIf<In> {
    pub fn new(f: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn always() -> Self {
        Self::new(|_| true)
    }

    pub fn never() -> Self {
        Self::new(|_| false)
    }

    pub fn call(&self, input: &In) -> bool {
        (self.0)(input)
    }
}

impl<In> fmt::Debug for EnableIf<In> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnableIf")
    }
}

#[derive(Clone)]
pub(crate) struct OnHedge(Arc<dyn Fn(OnHedgeArgs) + Send + Sync>);

impl OnHedge {
    pub fn new(f: impl Fn(OnHedgeArgs) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: OnHedgeArgs) {
        (self.0)(args);
    }
}

impl fmt::Debug for OnHedge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnHedge")
    }
}

#[derive(Clone)]
pub(crate) struct DelayFn(Arc<dyn Fn(HedgingDelayArgs) -> Duration + Send + Sync>);

impl DelayFn {
    pub fn new(f: impl Fn(HedgingDelayArgs) -> Duration + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: HedgingDelayArgs) -> Duration {
        (self.0)(args)
    }
}

impl fmt::Debug for DelayFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DelayFn")
    }
}
