//! A fragment-refresh engine: snapshot the tagged fragments of a document,
//! diff them against a freshly fetched version, and commit the differences
//! in place, optionally through caller-supplied transitions.

mod change_feed;
mod collector;
mod config;
mod dom;
mod error;
mod orchestrator;
mod parser;
mod request;
mod session;
mod snapshot;
mod transport;

pub use crate::change_feed::{ChangeFeed, StoreChange};
pub use crate::collector::{collect, ContentTag, BLOCK_MARKER};
pub use crate::config::Config;
pub use crate::dom::{
    Document, ElementData, Node, NodeBuilder, NodeData, NodeId, SharedDocument,
};
pub use crate::error::OrchestrationError;
pub use crate::orchestrator::{CompleteCallback, Completion, GlobalComplete};
pub use crate::parser::{FragmentParser, TestParser, TestParserState};
pub use crate::request::{AuxRequest, LoadRequest, DEFAULT_AUX_NAME};
pub use crate::session::Session;
pub use crate::snapshot::{
    commit, CommitCompletion, CompletionHandle, Flash, FlashOptions, RunBarrier, SharedStore,
    Store, Target, TransitionFn, TransitionJob, TransitionTable,
};
pub use crate::transport::{
    FetchRequest, FetchResponse, TestTransport, TestTransportState, Transport, ORIGIN_MARKER,
};
