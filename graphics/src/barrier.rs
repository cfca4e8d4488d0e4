//! Deferred resource state transitions.
//!
//! Transitions requested while recording are collected in a [`BarrierQueue`]
//! and submitted as one batched backend call when the queue is flushed, once
//! per frame before the bindless table update.
//!
//! Each transition may carry a completion callback. Callbacks run after the
//! whole batch has been handed to the backend, in enqueue order, and receive
//! the queue itself; anything they enqueue lands in the next flush.

use std::collections::HashMap;

use crate::backend::{GpuBackend, ResourceRef, StateTransition};
use crate::profiling::profile_scope;
use crate::types::ResourceState;

/// Completion callback of a queued transition.
pub type BarrierCallback = Box<dyn FnOnce(&mut BarrierQueue) + Send>;

/// A transition waiting for the next flush.
pub struct PendingBarrier {
    pub resource: ResourceRef,
    pub from: ResourceState,
    pub to: ResourceState,
    callback: Option<BarrierCallback>,
}

impl PendingBarrier {
    fn transition(&self) -> StateTransition {
        StateTransition {
            resource: self.resource,
            from: self.from,
            to: self.to,
        }
    }
}

impl std::fmt::Debug for PendingBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingBarrier")
            .field("resource", &self.resource)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// FIFO of pending state transitions.
///
/// Two enqueues for the same resource before a flush collapse into one entry:
/// the later transition and callback replace the earlier ones, and the entry
/// keeps the queue position of the first enqueue.
#[derive(Debug, Default)]
pub struct BarrierQueue {
    pending: Vec<PendingBarrier>,
    /// Index into `pending` per resource.
    positions: HashMap<ResourceRef, usize>,
}

impl BarrierQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transition of `resource` from `from` to `to`.
    pub fn enqueue(
        &mut self,
        resource: impl Into<ResourceRef>,
        from: ResourceState,
        to: ResourceState,
    ) {
        self.push(resource.into(), from, to, None);
    }

    /// Queue a transition with a callback that fires after the flush executes it.
    pub fn enqueue_with(
        &mut self,
        resource: impl Into<ResourceRef>,
        from: ResourceState,
        to: ResourceState,
        callback: impl FnOnce(&mut BarrierQueue) + Send + 'static,
    ) {
        self.push(resource.into(), from, to, Some(Box::new(callback)));
    }

    fn push(
        &mut self,
        resource: ResourceRef,
        from: ResourceState,
        to: ResourceState,
        callback: Option<BarrierCallback>,
    ) {
        let barrier = PendingBarrier {
            resource,
            from,
            to,
            callback,
        };

        match self.positions.get(&resource) {
            Some(&index) => {
                log::trace!("BarrierQueue: replacing pending transition of {resource:?}");
                self.pending[index] = barrier;
            }
            None => {
                self.positions.insert(resource, self.pending.len());
                self.pending.push(barrier);
            }
        }
    }

    /// Execute every queued transition, then run their callbacks.
    ///
    /// Transitions whose `from` equals `to` are left out of the backend batch,
    /// but their callbacks still run. An empty queue makes no backend call.
    ///
    /// Returns the number of barriers drained.
    pub fn flush(&mut self, backend: &mut dyn GpuBackend) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        profile_scope!("barrier_flush");

        let batch = std::mem::take(&mut self.pending);
        self.positions.clear();

        let transitions: Vec<StateTransition> = batch
            .iter()
            .filter(|barrier| barrier.from != barrier.to)
            .map(PendingBarrier::transition)
            .collect();
        if !transitions.is_empty() {
            backend.transition(&transitions);
        }
        log::trace!(
            "BarrierQueue: flushed {} barriers ({} transitions)",
            batch.len(),
            transitions.len()
        );

        let drained = batch.len();
        for barrier in batch {
            if let Some(callback) = barrier.callback {
                callback(self);
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The queued entry for `resource`, if any.
    pub fn pending(&self, resource: impl Into<ResourceRef>) -> Option<&PendingBarrier> {
        let resource = resource.into();
        self.positions
            .get(&resource)
            .map(|&index| &self.pending[index])
    }

    /// Remove the queued transition of `resource` without executing it or
    /// its callback. Returns true if one was queued.
    pub fn cancel(&mut self, resource: impl Into<ResourceRef>) -> bool {
        let Some(index) = self.positions.remove(&resource.into()) else {
            return false;
        };
        self.pending.remove(index);
        for position in self.positions.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }
        true
    }

    /// Drop every queued transition without executing it.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.positions.clear();
    }
}

static_assertions::assert_impl_all!(BarrierQueue: Send);
