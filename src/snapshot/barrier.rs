//! The completion barrier behind `Flash::run`.
//!
//! Commits are dispatched without waiting on one another; each signals the
//! barrier when it finishes, and the barrier resolves a single oneshot once
//! every expected store has been heard from. The barrier starts with a
//! dispatch hold so that it cannot resolve while commits are still being
//! dispatched, which also covers the zero-store case.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;

#[derive(Clone)]
pub struct RunBarrier {
    inner: Arc<Mutex<BarrierState>>,
}

struct BarrierState {
    outstanding: HashSet<String>,
    holding: bool,
    sender: Option<oneshot::Sender<()>>,
}

impl RunBarrier {
    /// Arms a barrier expecting one completion per name. The receiver
    /// resolves once every name has signalled and the dispatch hold has been
    /// released. Dropping the receiver cancels the whole run's completion as
    /// a group; signalling a cancelled barrier is harmless.
    pub fn new(expected: impl IntoIterator<Item = String>) -> (RunBarrier, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();

        let barrier = RunBarrier {
            inner: Arc::new(Mutex::new(BarrierState {
                outstanding: expected.into_iter().collect(),
                holding: true,
                sender: Some(sender),
            })),
        };

        (barrier, receiver)
    }

    /// Records a completion. A name that already signalled, or was never
    /// expected, is not counted again.
    pub fn signal(&self, name: &str) {
        let mut state = self.inner.lock().unwrap();

        if !state.outstanding.remove(name) {
            return;
        }

        maybe_resolve(&mut state);
    }

    /// Releases the dispatch hold. Called once dispatching is over; with no
    /// outstanding names left this resolves the barrier on the spot.
    pub fn release(&self) {
        let mut state = self.inner.lock().unwrap();
        state.holding = false;
        maybe_resolve(&mut state);
    }
}

fn maybe_resolve(state: &mut BarrierState) {
    if state.holding || !state.outstanding.is_empty() {
        return;
    }

    if let Some(sender) = state.sender.take() {
        let _ = sender.send(());
    }
}
