// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A small bounded free-list.
//!
//! Hedging churns through `TaskExecution` slots on every call. Allocating a
//! fresh one per attempt is wasteful when the same pipeline is driven at
//! high throughput, so slots are rented and returned instead. Returning
//! past capacity simply drops the slot rather than growing the pool.

use parking_lot::Mutex;

pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    capacity: usize,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self { free: Mutex::new(Vec::with_capacity(capacity)), capacity, factory: Box::new(factory) }
    }

    /// Takes a slot from the free list, or builds a fresh one if the pool is
    /// currently empty.
    pub fn rent(&self) -> T {
        self.free.lock().pop().unwrap_or_else(|| (self.factory)())
    }

    /// Returns a slot to the free list. Dropped silently once `capacity` is
    /// reached.
    pub fn give_back(&self, item: T) {
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(item);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("capacity", &self.capacity).field("free", &self.len()).finish()
    }
}
