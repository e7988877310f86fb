// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The per-call carrier: cancellation, a property bag, and an event log.
//!
//! A [`ResilienceContext`] is created once per call into a pipeline and
//! passed down through every strategy. Hedging needs to give each racing
//! attempt an isolated view of the property bag (so a losing attempt's
//! writes never leak into the winner) while still being able to restore the
//! original context's bag, by the same reference, once the race is over.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancellation::CancellationToken;

/// A small type-erased map. Values are stored behind `Arc` so cloning the
/// bag (to hand an isolated copy to an attempt) is O(entries) and never
/// touches the values themselves.
#[derive(Clone, Default)]
pub struct PropertyBag {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl PropertyBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>())?.downcast_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBag").field("len", &self.values.len()).finish()
    }
}

/// A single entry appended to a context's event log: hedging records one
/// whenever it launches an attempt or accepts a winner.
#[derive(Debug, Clone)]
pub struct ResilienceEvent {
    pub strategy: &'static str,
    pub description: String,
}

/// The context threaded through a pipeline for the lifetime of one call.
///
/// Cloning a `ResilienceContext` clones the handle, not the state: all
/// clones of the root context (and its children, via [`Self::child`]) see
/// the same cancellation chain and share event-log/property-bag cells with
/// whichever ancestor owns them, except where a strategy has explicitly
/// isolated a child for the duration of a race.
#[derive(Clone)]
pub struct ResilienceContext {
    properties: Arc<Mutex<PropertyBag>>,
    events: Arc<Mutex<Vec<ResilienceEvent>>>,
    cancellation: CancellationToken,
    continue_on_captured_context: bool,
}

impl ResilienceContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: Arc::new(Mutex::new(PropertyBag::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            cancellation: CancellationToken::new(),
            continue_on_captured_context: true,
        }
    }

    #[must_use]
    pub fn continue_on_captured_context(mut self, value: bool) -> Self {
        self.continue_on_captured_context = value;
        self
    }

    #[must_use]
    pub const fn is_continuing_on_captured_context(&self) -> bool {
        self.continue_on_captured_context
    }

    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn with_properties<R>(&self, f: impl FnOnce(&PropertyBag) -> R) -> R {
        f(&self.properties.lock())
    }

    pub fn with_properties_mut<R>(&self, f: impl FnOnce(&mut PropertyBag) -> R) -> R {
        f(&mut self.properties.lock())
    }

    pub fn record_event(&self, strategy: &'static str, description: impl Into<String>) {
        self.events.lock().push(ResilienceEvent { strategy, description: description.into() });
    }

    #[must_use]
    pub fn events(&self) -> Vec<ResilienceEvent> {
        self.events.lock().clone()
    }

    /// Creates an isolated child context for a single racing attempt: its
    /// own property bag (seeded from the current contents of `self`'s) and
    /// its own event log, but a cancellation token linked to `self`'s so the
    /// attempt still observes the outer call being cancelled.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            properties: Arc::new(Mutex::new(self.properties.lock().clone())),
            events: Arc::new(Mutex::new(Vec::new())),
            cancellation: self.cancellation.child(),
            continue_on_captured_context: self.continue_on_captured_context,
        }
    }
}

impl Default for ResilienceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResilienceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceContext")
            .field("cancelled", &self.is_cancelled())
            .field("continue_on_captured_context", &self.continue_on_captured_context)
            .finish_non_exhaustive()
    }
}

/// Captured state of a [`ResilienceContext`] at the moment hedging takes it
/// over, so it can be restored once the race is decided.
pub(crate) struct ContextSnapshot {
    original_properties: PropertyBag,
    properties_target: Arc<Mutex<PropertyBag>>,
    events_target: Arc<Mutex<Vec<ResilienceEvent>>>,
}

impl ContextSnapshot {
    /// Takes a snapshot of `context`'s current property bag. The bag itself
    /// is left untouched: hedging reads and writes through per-attempt
    /// children (see [`ResilienceContext::child`]), not through the parent
    /// directly, so there is nothing to swap in.
    pub fn capture(context: &ResilienceContext) -> Self {
        Self {
            original_properties: context.properties.lock().clone(),
            properties_target: Arc::clone(&context.properties),
            events_target: Arc::clone(&context.events),
        }
    }

    /// Restores the parent's property bag: either the accepted attempt's
    /// final bag, if one was accepted, or the bag as it stood at capture
    /// time. The `Arc` cells are never replaced, so the parent context's
    /// property-bag and event-log references are unchanged by the call.
    ///
    /// The accepted attempt's events, if any, are appended onto the
    /// parent's own event log rather than replacing it — a losing
    /// attempt's events are dropped along with its isolated child context.
    pub fn restore(&self, accepted: Option<(PropertyBag, Vec<ResilienceEvent>)>) {
        match accepted {
            Some((properties, events)) => {
                *self.properties_target.lock() = properties;
                self.events_target.lock().extend(events);
            }
            None => *self.properties_target.lock() = self.original_properties.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextSnapshot, ResilienceContext};

    #[test]
    fn child_inherits_properties_but_not_the_cell() {
        let parent = ResilienceContext::new();
        parent.with_properties_mut(|bag| bag.insert(7_u32));
        let child = parent.child();
        assert_eq!(child.with_properties(|bag| bag.get::<u32>().copied()), Some(7));

        child.with_properties_mut(|bag| bag.insert(9_u32));
        assert_eq!(parent.with_properties(|bag| bag.get::<u32>().copied()), Some(7));
    }

    #[test]
    fn child_observes_parent_cancellation() {
        let parent = ResilienceContext::new();
        let child = parent.child();
        parent.cancellation().cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn restore_without_acceptance_keeps_original_contents() {
        let context = ResilienceContext::new();
        context.with_properties_mut(|bag| bag.insert("original"));
        let snapshot = ContextSnapshot::capture(&context);

        context.with_properties_mut(|bag| bag.insert("mutated"));
        snapshot.restore(None);

        assert_eq!(context.with_properties(|bag| bag.get::<&str>().copied()), Some("original"));
    }

    #[test]
    fn restore_with_acceptance_installs_the_accepted_bag() {
        let context = ResilienceContext::new();
        let snapshot = ContextSnapshot::capture(&context);

        let winner = context.child();
        winner.with_properties_mut(|bag| bag.insert("from winner"));
        let accepted = winner.with_properties(Clone::clone);
        snapshot.restore(Some((accepted, Vec::new())));

        assert_eq!(context.with_properties(|bag| bag.get::<&str>().copied()), Some("from winner"));
    }

    #[test]
    fn restore_with_acceptance_appends_the_winners_events_onto_the_parents_log() {
        let context = ResilienceContext::new();
        context.record_event("retry", "attempt 0 started");
        let snapshot = ContextSnapshot::capture(&context);

        let winner = context.child();
        winner.record_event("hedging", "attempt 1 accepted");
        let accepted_properties = winner.with_properties(Clone::clone);
        snapshot.restore(Some((accepted_properties, winner.events())));

        let descriptions: Vec<_> = context.events().iter().map(|event| event.description.clone()).collect();
        assert_eq!(descriptions, vec!["attempt 0 started", "attempt 1 accepted"]);
    }
}
