//! Stores: named groups of same-tagged elements sharing one logical value.
//!
//! A store reads and writes its value across every element it owns, carries a
//! pending target staged by a diff against another flash, and commits that
//! target either synchronously or through a caller-supplied transition. The
//! commit path is a small state machine: no target completes immediately, a
//! target without a transition applies and completes, and a target with a
//! transition completes only once every owned element's transition has
//! finished.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::change_feed::{ChangeFeed, StoreChange};
use crate::collector::ContentTag;
use crate::dom::{NodeId, SharedDocument};

use super::transition::{TransitionFn, TransitionJob};

/// Stores are shared so that deferred transition completions can write back
/// into them after `commit` has returned.
pub type SharedStore = Arc<Mutex<Store>>;

/// Invoked with the store's name exactly once per commit.
pub type CommitCompletion = Box<dyn FnOnce(&str) + Send>;

/// What a commit will apply. Staged by `compare` during a diff, or explicitly
/// through `stage`.
pub enum Target {
    /// An element in another snapshot; its content becomes the new value.
    Element(SharedDocument, NodeId),
    /// A simulated value with no backing element.
    Literal(String),
    /// Nothing staged; commit is a no-op.
    Absent,
}

pub struct Store {
    name: String,
    doc: SharedDocument,
    tag: ContentTag,
    elements: Vec<NodeId>,
    value: String,
    target: Target,
    transition: Option<Arc<TransitionFn>>,
    feed: Arc<ChangeFeed<StoreChange>>,
}

impl Store {
    pub(crate) fn new(
        name: String,
        doc: SharedDocument,
        tag: ContentTag,
        transition: Option<Arc<TransitionFn>>,
        feed: Arc<ChangeFeed<StoreChange>>,
        value: String,
    ) -> Store {
        Store {
            name,
            doc,
            tag,
            elements: Vec::new(),
            value,
            target: Target::Absent,
            transition,
            feed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element handles owned by this store, in document order.
    pub fn elements(&self) -> &[NodeId] {
        &self.elements
    }

    pub(crate) fn add_element(&mut self, id: NodeId) {
        self.elements.push(id);
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    /// Writes a value to every owned element, caches it, and emits a change
    /// notification through the session's feed.
    pub fn set(&mut self, value: &str) {
        {
            let mut doc = self.doc.lock().unwrap();
            for &element in &self.elements {
                doc.set_content(element, value);
            }
        }

        self.value = value.to_owned();

        self.feed.push(StoreChange {
            name: self.name.clone(),
            value: self.value.clone(),
        });
    }

    /// Resolves a value by keyed lookup under this store's name and applies
    /// it. A missing or null entry resolves to the empty string.
    pub fn set_keyed(&mut self, table: &serde_json::Map<String, Value>) {
        let resolved = table.get(&self.name).map(json_text).unwrap_or_default();
        self.set(&resolved);
    }

    /// Stages this store's target from another flash's matching store: its
    /// first owned element, or `Absent` when there is no counterpart. Only
    /// the first element is ever used, even if the other store owns several.
    pub fn compare(&mut self, other: Option<&SharedStore>) {
        self.target = match other {
            Some(other) => {
                let other = other.lock().unwrap();
                match other.elements.first() {
                    Some(&id) => Target::Element(Arc::clone(&other.doc), id),
                    None => Target::Absent,
                }
            }
            None => Target::Absent,
        };
    }

    /// Stages an explicit target. This is how `Literal` targets arise.
    pub fn stage(&mut self, target: Target) {
        self.target = target;
    }
}

/// Commits a store's staged target, consuming it. `done` fires exactly once,
/// after the value is applied; for animated commits, only once every owned
/// element's transition has finished.
pub fn commit(store: &SharedStore, done: CommitCompletion) {
    let mut guard = store.lock().unwrap();
    let name = guard.name.clone();

    let target = mem::replace(&mut guard.target, Target::Absent);
    let resolved = match target {
        Target::Absent => {
            drop(guard);
            done(&name);
            return;
        }
        Target::Element(source, id) => source.lock().unwrap().content(id),
        Target::Literal(text) => text,
    };

    let transition = match &guard.transition {
        Some(transition) => Arc::clone(transition),
        None => {
            guard.set(&resolved);
            drop(guard);
            done(&name);
            return;
        }
    };

    // Prepare the animated swap under the document lock: block each element
    // against concurrent re-collection and build its transitional clone,
    // already carrying the new content.
    let doc_handle = Arc::clone(&guard.doc);
    let tag = guard.tag.clone();
    let mut swaps = Vec::new();
    {
        let mut doc = doc_handle.lock().unwrap();
        for &element in &guard.elements {
            tag.mark_blocked(&mut doc, element);
            let incoming = doc.clone_subtree(element);
            doc.set_content(incoming, &resolved);
            swaps.push((element, incoming));
        }
    }
    drop(guard);

    let shared = Arc::new(CommitShared {
        store: Arc::clone(store),
        doc: Arc::clone(&doc_handle),
        tag,
        name,
        resolved,
        remaining: Mutex::new(swaps.len()),
        done: Mutex::new(Some(done)),
    });

    if swaps.is_empty() {
        // Nothing to animate; the commit is already over.
        shared.finish_commit();
        return;
    }

    for (outgoing, incoming) in swaps {
        transition(TransitionJob {
            doc: Arc::clone(&doc_handle),
            outgoing,
            incoming,
            completion: CompletionHandle {
                shared: Arc::clone(&shared),
                outgoing,
                incoming,
                fired: AtomicBool::new(false),
            },
        });
    }
}

struct CommitShared {
    store: SharedStore,
    doc: SharedDocument,
    tag: ContentTag,
    name: String,
    resolved: String,
    remaining: Mutex<usize>,
    done: Mutex<Option<CommitCompletion>>,
}

impl CommitShared {
    fn element_finished(&self) {
        let all_finished = {
            let mut remaining = self.remaining.lock().unwrap();
            *remaining -= 1;
            *remaining == 0
        };

        if all_finished {
            self.finish_commit();
        }
    }

    fn finish_commit(&self) {
        if !self.resolved.is_empty() {
            self.store.lock().unwrap().set(&self.resolved);
        }

        if let Some(done) = self.done.lock().unwrap().take() {
            done(&self.name);
        }
    }
}

/// Handed to a transition for one element of an animated commit.
pub struct CompletionHandle {
    shared: Arc<CommitShared>,
    outgoing: NodeId,
    incoming: NodeId,
    fired: AtomicBool,
}

impl CompletionHandle {
    /// Marks this element's transition as finished: the element becomes
    /// collectible again and the transitional clone is dropped if the
    /// transition left it in the tree. Firing a handle twice is a guarded
    /// no-op.
    pub fn finish(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut doc = self.shared.doc.lock().unwrap();
            self.shared.tag.unmark_blocked(&mut doc, self.outgoing);

            if doc.contains(self.incoming) {
                doc.remove(self.incoming);
            }
        }

        self.shared.element_finished();
    }
}

pub(crate) fn json_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
