//! The parsing seam.
//!
//! Turning a fetched body into nodes is the host's concern; the engine only
//! requires something that can produce a `Document` from a string. Tests
//! register prebuilt documents against exact body strings instead of parsing
//! anything.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::dom::{Document, NodeBuilder};

pub trait FragmentParser: Send + Sync {
    fn parse(&self, source: &str) -> Document;
}

/// Shared handle for registering documents with a `TestParser`.
#[derive(Clone)]
pub struct TestParserState {
    inner: Arc<Mutex<HashMap<String, Document>>>,
}

impl TestParserState {
    pub fn register(&self, source: &str, document: Document) {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(source.to_owned(), document);
    }
}

pub struct TestParser {
    state: TestParserState,
}

impl TestParser {
    pub fn new() -> (TestParserState, TestParser) {
        let state = TestParserState {
            inner: Arc::new(Mutex::new(HashMap::new())),
        };

        (state.clone(), TestParser { state })
    }
}

impl FragmentParser for TestParser {
    fn parse(&self, source: &str) -> Document {
        let inner = self.state.inner.lock().unwrap();

        match inner.get(source) {
            Some(document) => document.clone(),
            // An unregistered body parses to an empty document, the same as
            // a response with no tagged fragments.
            None => Document::new(NodeBuilder::element("body")),
        }
    }
}
