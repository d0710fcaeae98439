//! The snapshot subsystem: stores, flashes, and the completion barrier.
//!
//! A flash is a snapshot of every tagged fragment under one root at one
//! instant. Refreshing content is expressed as two flashes, the long-lived
//! one over the live document and a short-lived frozen one built from a
//! fetched response, diffed by name and committed store by store, optionally
//! through caller-supplied transitions. Treating the swap as snapshot, diff,
//! commit keeps the mutation surface small: nothing outside the tagged
//! fragments is ever touched.

mod barrier;
mod flash;
mod store;
mod transition;

pub use barrier::RunBarrier;
pub use flash::{Flash, FlashOptions};
pub use store::{commit, CommitCompletion, CompletionHandle, SharedStore, Store, Target};
pub use transition::{TransitionFn, TransitionJob, TransitionTable};
