//! Flashes: snapshots of every tagged fragment under one root.
//!
//! The live document keeps one long-lived flash; every fetched response gets
//! a short-lived frozen one. Diffing is `generate` (stage each store's target
//! from the other flash) followed by `run` (commit everything behind the
//! completion barrier).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use serde_json::{Map, Value};

use crate::change_feed::{ChangeFeed, StoreChange};
use crate::collector::{self, ContentTag};
use crate::dom::{NodeId, SharedDocument};

use super::barrier::RunBarrier;
use super::store::{self, json_text, SharedStore, Store};
use super::transition::TransitionTable;

pub struct FlashOptions {
    pub doc: SharedDocument,
    /// Collection root; defaults to the document root.
    pub root: Option<NodeId>,
    /// Clone every collected element before grouping, so mutations through
    /// the flash can never leak into the source tree.
    pub frozen: bool,
    pub tag: ContentTag,
    /// Per-flash transitions, consulted before the session-wide table.
    pub transitions: TransitionTable,
    pub fallback_transitions: TransitionTable,
    pub feed: Arc<ChangeFeed<StoreChange>>,
}

pub struct Flash {
    doc: SharedDocument,
    root: NodeId,
    frozen: bool,
    tag: ContentTag,
    transitions: TransitionTable,
    fallback_transitions: TransitionTable,
    feed: Arc<ChangeFeed<StoreChange>>,
    stores: HashMap<String, SharedStore>,
}

impl Flash {
    pub fn new(options: FlashOptions) -> Flash {
        let root = options
            .root
            .unwrap_or_else(|| options.doc.lock().unwrap().root_id());

        let mut flash = Flash {
            doc: options.doc,
            root,
            frozen: options.frozen,
            tag: options.tag,
            transitions: options.transitions,
            fallback_transitions: options.fallback_transitions,
            feed: options.feed,
            stores: HashMap::new(),
        };

        flash.update();
        flash
    }

    pub fn doc(&self) -> SharedDocument {
        Arc::clone(&self.doc)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Re-collects from the root and rebuilds the store grouping. Used to
    /// refresh the live flash after the document has mutated.
    pub fn update(&mut self) {
        let list = {
            let doc = self.doc.lock().unwrap();
            collector::collect(&doc, self.root, &self.tag)
        };

        self.organize(list);
    }

    /// Groups a collected element list into stores keyed by tag value.
    /// Elements keep document order within their store; each new store seeds
    /// its value from its first element and resolves its transition from the
    /// per-flash table, then the fallback, else none.
    pub fn organize(&mut self, list: Vec<NodeId>) {
        self.stores.clear();

        let doc_handle = Arc::clone(&self.doc);
        let mut doc = doc_handle.lock().unwrap();

        for id in list {
            let name = match self.tag.store_name(&doc, id) {
                Some(name) => name.to_owned(),
                None => continue,
            };

            let id = if self.frozen { doc.clone_subtree(id) } else { id };

            if !self.stores.contains_key(&name) {
                let transition = self
                    .transitions
                    .get(&name)
                    .or_else(|| self.fallback_transitions.get(&name));

                let store = Store::new(
                    name.clone(),
                    Arc::clone(&self.doc),
                    self.tag.clone(),
                    transition,
                    Arc::clone(&self.feed),
                    doc.content(id),
                );

                self.stores
                    .insert(name.clone(), Arc::new(Mutex::new(store)));
            }

            self.stores
                .get(&name)
                .expect("store inserted above")
                .lock()
                .unwrap()
                .add_element(id);
        }
    }

    /// Replaces the per-flash transition table. Takes effect on the next
    /// `update` or `organize`, when stores are rebuilt.
    pub fn set_transitions(&mut self, transitions: TransitionTable) {
        self.transitions = transitions;
    }

    pub fn find(&self, name: &str) -> Option<SharedStore> {
        self.stores.get(name).map(Arc::clone)
    }

    /// Applies a simulated set of values by name. Names without a matching
    /// store are ignored.
    pub fn map(&self, values: &Map<String, Value>) {
        for (name, value) in values {
            if let Some(store) = self.stores.get(name) {
                store.lock().unwrap().set(&json_text(value));
            }
        }
    }

    /// A name-to-current-value snapshot of every store.
    pub fn condense(&self) -> HashMap<String, String> {
        self.stores
            .iter()
            .map(|(name, store)| (name.clone(), store.lock().unwrap().get().to_owned()))
            .collect()
    }

    /// Stages every local store's target from the matching store in `other`.
    /// One-directional: names present only in `other` never become new
    /// stores here.
    pub fn generate(&mut self, other: &Flash) -> &mut Flash {
        for (name, store) in &self.stores {
            store.lock().unwrap().compare(other.find(name).as_ref());
        }

        self
    }

    /// Dispatches every store's commit, invokes `on_start` synchronously once
    /// dispatching is over, and returns the barrier receiver. The receiver
    /// resolves after all stores have completed (immediately for a flash
    /// with no stores) and never before `on_start` has run.
    pub fn run(&self, on_start: Option<Box<dyn FnOnce()>>) -> oneshot::Receiver<()> {
        let (barrier, receiver) = RunBarrier::new(self.stores.keys().cloned());

        for store in self.stores.values() {
            let barrier = barrier.clone();
            store::commit(store, Box::new(move |name: &str| barrier.signal(name)));
        }

        if let Some(on_start) = on_start {
            on_start();
        }

        barrier.release();
        receiver
    }
}
