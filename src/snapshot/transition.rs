//! Caller-supplied transitions for animated swaps.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dom::{NodeId, SharedDocument};

use super::store::CompletionHandle;

/// A function governing the swap from outgoing to incoming content for one
/// element of a store. The transition owns inserting and removing nodes; it
/// must finish the job's completion handle once its animation is over.
pub type TransitionFn = dyn Fn(TransitionJob) + Send + Sync;

/// One element's worth of an animated commit. `incoming` is a detached clone
/// of `outgoing` already carrying the new content.
pub struct TransitionJob {
    pub doc: SharedDocument,
    pub outgoing: NodeId,
    pub incoming: NodeId,
    pub completion: CompletionHandle,
}

/// Transitions keyed by store name. Flashes resolve through their own table
/// first and fall back to the session-wide one.
#[derive(Clone, Default)]
pub struct TransitionTable {
    entries: HashMap<String, Arc<TransitionFn>>,
}

impl TransitionTable {
    pub fn new() -> TransitionTable {
        TransitionTable {
            entries: HashMap::new(),
        }
    }

    pub fn insert<F>(&mut self, name: &str, transition: F)
    where
        F: Fn(TransitionJob) + Send + Sync + 'static,
    {
        self.entries.insert(name.to_owned(), Arc::new(transition));
    }

    pub fn get(&self, name: &str) -> Option<Arc<TransitionFn>> {
        self.entries.get(name).map(Arc::clone)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
