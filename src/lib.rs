// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A hedging resilience strategy: races concurrent attempts of an
//! operation so that one slow or failing attempt does not dominate the
//! call's latency.
//!
//! Hedging is configured through [`HedgingLayer`], a typestate builder that
//! only implements [`layered::Layer`] once both the input-cloning and
//! outcome-recovery callbacks are set:
//!
//! ```
//! use ricochet::{HedgingLayer, ResilienceOptions};
//! use layered::Layer;
//! use recoverable::{Recovery, RecoveryInfo};
//! use tick::Clock;
//!
//! #[derive(Clone)]
//! struct Echo;
//!
//! #[derive(Clone)]
//! struct Reply(u32);
//!
//! impl layered::Service<u32> for Echo {
//!     type Out = Reply;
//!     async fn execute(&self, input: u32) -> Reply {
//!         Reply(input)
//!     }
//! }
//!
//! impl Recovery for Reply {
//!     fn recovery(&self) -> RecoveryInfo {
//!         RecoveryInfo::never()
//!     }
//! }
//!
//! # async fn run() {
//! let options = ResilienceOptions::new(Clock::new_frozen()).name("demo");
//! let layer = HedgingLayer::new("echo", options).clone_input().recovery();
//! let hedging = layer.layer(Echo);
//! let _ = hedging.execute_with(&ricochet::ResilienceContext::new(), 1).await;
//! # }
//! ```

mod cancellation;
mod context;
mod hedging;
mod options;
mod outcome;
mod pool;
mod signal;
mod telemetry;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cancellation::CancellationToken;
pub use context::{PropertyBag, ResilienceContext, ResilienceEvent};
pub use hedging::args::{CloneArgs, HedgingDelayArgs, OnHedgeArgs, RecoveryArgs};
pub use hedging::layer::{HedgingLayer, NotSet, Set};
pub use hedging::mode::HedgingMode;
pub use hedging::Hedging;
pub use options::ResilienceOptions;
pub use outcome::{Failure, Outcome};
