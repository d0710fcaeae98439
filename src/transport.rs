//! The transport seam.
//!
//! The engine never issues network requests itself; it hands a
//! `FetchRequest` to whatever `Transport` the host provides and works with
//! the raw text body that comes back. In tests the transport is stubbed out
//! with a scriptable fake, the same way the in-memory filesystem fakes work
//! elsewhere in this codebase's lineage.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Condvar, Mutex};

/// Header attached to every request so the far side can tell the fetch
/// originated from this engine.
pub const ORIGIN_MARKER: (&str, &str) = ("x-refrag", "true");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_owned(),
            headers: vec![(ORIGIN_MARKER.0.to_owned(), ORIGIN_MARKER.1.to_owned())],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: &str) -> FetchResponse {
        FetchResponse {
            status: 200,
            body: body.to_owned(),
        }
    }

    pub fn not_found() -> FetchResponse {
        FetchResponse {
            status: 404,
            body: String::new(),
        }
    }

    /// A 200 is a success; so is a zero status for a `file:///` url, which is
    /// how local file reads report on hosts without real HTTP statuses.
    pub fn is_success(&self, url: &str) -> bool {
        self.status == 200 || (self.status == 0 && url.contains("file:///"))
    }
}

/// The generic interface the orchestrator uses to read files. An `Err` is a
/// transport-level failure (no response at all); a non-success status comes
/// back as a normal `FetchResponse`.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> io::Result<FetchResponse>;

    /// Called when a newer orchestration supersedes the current one. The
    /// orchestrator discards stale results either way; transports that can
    /// cancel an in-flight operation should do so here.
    fn abort_in_flight(&self) {}
}

/// Shared handle for scripting and observing a `TestTransport` from a test
/// while the orchestrator owns the transport itself.
#[derive(Clone)]
pub struct TestTransportState {
    inner: Arc<TestTransportInner>,
}

struct TestTransportInner {
    locked: Mutex<TestTransportLocked>,
    signal: Condvar,
}

#[derive(Default)]
struct TestTransportLocked {
    responses: HashMap<String, FetchResponse>,
    io_failures: HashSet<String>,
    held: HashSet<String>,
    log: Vec<FetchRequest>,
    aborts: usize,
}

impl TestTransportState {
    /// Scripts the response for a url. Urls without a scripted response
    /// answer 404.
    pub fn respond(&self, url: &str, response: FetchResponse) {
        let mut locked = self.inner.locked.lock().unwrap();
        locked.responses.insert(url.to_owned(), response);
    }

    /// Scripts a transport-level failure for a url.
    pub fn fail_io(&self, url: &str) {
        let mut locked = self.inner.locked.lock().unwrap();
        locked.io_failures.insert(url.to_owned());
    }

    /// Makes fetches of a url block until `release` is called, so tests can
    /// observe the orchestrator mid-fetch.
    pub fn hold(&self, url: &str) {
        let mut locked = self.inner.locked.lock().unwrap();
        locked.held.insert(url.to_owned());
    }

    pub fn release(&self, url: &str) {
        let mut locked = self.inner.locked.lock().unwrap();
        locked.held.remove(url);
        self.inner.signal.notify_all();
    }

    /// All requests seen so far, in the order they arrived.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.inner.locked.lock().unwrap().log.clone()
    }

    /// Blocks until a request for the given url has been logged.
    pub fn wait_for_request(&self, url: &str) {
        let mut locked = self.inner.locked.lock().unwrap();
        while !locked.log.iter().any(|request| request.url == url) {
            locked = self.inner.signal.wait(locked).unwrap();
        }
    }

    pub fn aborts(&self) -> usize {
        self.inner.locked.lock().unwrap().aborts
    }
}

pub struct TestTransport {
    state: TestTransportState,
}

impl TestTransport {
    pub fn new() -> (TestTransportState, TestTransport) {
        let state = TestTransportState {
            inner: Arc::new(TestTransportInner {
                locked: Mutex::new(TestTransportLocked::default()),
                signal: Condvar::new(),
            }),
        };

        (state.clone(), TestTransport { state })
    }
}

impl Transport for TestTransport {
    fn fetch(&self, request: &FetchRequest) -> io::Result<FetchResponse> {
        let inner = &self.state.inner;
        let mut locked = inner.locked.lock().unwrap();

        locked.log.push(request.clone());
        inner.signal.notify_all();

        while locked.held.contains(&request.url) {
            locked = inner.signal.wait(locked).unwrap();
        }

        if locked.io_failures.contains(&request.url) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "scripted transport failure",
            ));
        }

        match locked.responses.get(&request.url) {
            Some(response) => Ok(response.clone()),
            None => Ok(FetchResponse::not_found()),
        }
    }

    fn abort_in_flight(&self) {
        let mut locked = self.state.inner.locked.lock().unwrap();
        locked.aborts += 1;
    }
}
