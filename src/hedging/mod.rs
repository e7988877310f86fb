// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The hedging strategy: races concurrent attempts of an operation.

pub mod args;
pub(crate) mod callbacks;
pub(crate) mod controller;
pub(crate) mod execution_context;
pub mod layer;
pub mod mode;
pub(crate) mod strategy;
pub(crate) mod task_execution;

pub use layer::{HedgingLayer, NotSet, Set};
pub use mode::HedgingMode;
pub use strategy::Hedging;
