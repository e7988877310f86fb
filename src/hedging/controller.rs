// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! C4: per-strategy factory owning the execution-context pool.

use std::sync::Arc;

use crate::hedging::execution_context::HedgingExecutionContext;
use crate::hedging::task_execution::TaskExecution;
use crate::pool::Pool;

/// Owns the pools a [`crate::hedging::strategy::HedgingStrategy`] rents
/// from on every call. One controller is shared (via `Arc`) across every
/// clone of a configured hedging service.
pub(crate) struct HedgingController<Out> {
    contexts: Pool<HedgingExecutionContext<Out>>,
}

impl<Out: Send + 'static> HedgingController<Out> {
    pub fn new(max_attempts: u32, pool_capacity: usize) -> Self {
        let tasks = Arc::new(Pool::new(pool_capacity, TaskExecution::new));
        let contexts = Pool::new(pool_capacity, move || HedgingExecutionContext::new(Arc::clone(&tasks), max_attempts));
        Self { contexts }
    }

    pub fn rent_context(&self) -> HedgingExecutionContext<Out> {
        self.contexts.rent()
    }

    pub fn return_context(&self, context: HedgingExecutionContext<Out>) {
        self.contexts.give_back(context);
    }
}

impl<Out> std::fmt::Debug for HedgingController<Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgingController").field("pooled_contexts", &self.contexts.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::HedgingController;

    #[tokio::test]
    async fn rent_and_return_round_trips_through_the_pool() {
        let controller = HedgingController::<u32>::new(2, 4);
        let context = controller.rent_context();
        controller.return_context(context);
        assert_eq!(format!("{controller:?}"), "HedgingController { pooled_contexts: 1 }");
    }
}
