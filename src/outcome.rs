// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The result of a single racing attempt.
//!
//! Every attempt either produces a value or fails to produce one at all
//! (panic or forced cancellation). `Outcome` keeps both possibilities in one
//! type so the hedging loop never has to special-case "the future threw" —
//! it is just another variant to classify.

use recoverable::{Recovery, RecoveryInfo};
use tokio::task::JoinError;

#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

#[derive(Debug, Clone)]
pub enum Failure {
    /// The attempt's future panicked; the payload is the panic message,
    /// downcast to a string on a best-effort basis.
    Panicked(String),
    /// The attempt was aborted before it produced a value.
    Cancelled,
}

impl<T> Outcome<T> {
    pub(crate) fn from_join_result(result: Result<T, JoinError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if err.is_cancelled() => Self::Failure(Failure::Cancelled),
            Err(err) => Self::Failure(Failure::Panicked(err.to_string())),
        }
    }

    #[must_use]
    pub const fn as_success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Failures arising purely from the race machinery (panic, cancellation)
/// are classified without consulting the caller's recovery predicate: a
/// panic is always worth retrying if attempts remain, a cancellation always
/// ends the race immediately.
impl<T: Recovery> Recovery for Outcome<T> {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::Success(value) => value.recovery(),
            Self::Failure(Failure::Panicked(_)) => RecoveryInfo::retry(),
            Self::Failure(Failure::Cancelled) => RecoveryInfo::never(),
        }
    }
}
