//! Session-scoped notification of store value changes.
//!
//! Replaces a document-wide event bus: observers subscribe to the feed owned
//! by their session instead of listening on a global channel. The feed keeps
//! a persistent history indexed by cursor so that a subscriber never misses
//! changes that landed between reads.

use std::sync::{Mutex, RwLock};

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};

/// Emitted every time a store's value changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChange {
    pub name: String,
    pub value: String,
}

/// A change feed with persistent history that can be subscribed to.
#[derive(Default)]
pub struct ChangeFeed<T> {
    history: RwLock<Vec<T>>,
    subscribers: Mutex<Vec<Subscriber<T>>>,
}

impl<T: Clone> ChangeFeed<T> {
    pub fn new() -> ChangeFeed<T> {
        ChangeFeed {
            history: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, change: T) {
        let mut subscribers = self.subscribers.lock().unwrap();
        let mut history = self.history.write().unwrap();
        history.push(change);

        let mut waiting = Vec::new();
        for subscriber in subscribers.drain(..) {
            if let Some(subscriber) = flush(&history, subscriber) {
                waiting.push(subscriber);
            }
        }

        *subscribers = waiting;
    }

    /// Subscribe to any changes recorded after the given cursor. The receiver
    /// resolves immediately when the cursor is already behind the history.
    pub fn subscribe(&self, cursor: u32) -> oneshot::Receiver<(u32, Vec<T>)> {
        let (sender, receiver) = oneshot::channel();

        let subscriber = {
            let history = self.history.read().unwrap();

            match flush(&history, Subscriber { sender, cursor }) {
                Some(subscriber) => subscriber,
                None => return receiver,
            }
        };

        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.push(subscriber);

        receiver
    }

    pub fn cursor(&self) -> u32 {
        self.history.read().unwrap().len() as u32
    }
}

struct Subscriber<T> {
    sender: oneshot::Sender<(u32, Vec<T>)>,
    cursor: u32,
}

/// Fires a subscriber whose cursor is behind the history; hands it back
/// untouched otherwise.
fn flush<T: Clone>(history: &[T], subscriber: Subscriber<T>) -> Option<Subscriber<T>> {
    let head = history.len() as u32;

    if subscriber.cursor < head {
        let changes = history[(subscriber.cursor as usize)..].to_vec();
        let _ = subscriber.sender.send((head, changes));
        None
    } else {
        Some(subscriber)
    }
}
