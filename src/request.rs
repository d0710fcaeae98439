//! Request descriptors: what one orchestration should fetch and how the
//! result should be committed and reported.

use crate::error::OrchestrationError;
use crate::orchestrator::{CompleteCallback, Completion};
use crate::snapshot::{TransitionJob, TransitionTable};

/// The auxiliary request whose parsed value becomes the whole result map
/// instead of being nested under its name.
pub const DEFAULT_AUX_NAME: &str = "default";

/// One named structured-data fetch alongside the primary document fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxRequest {
    pub name: String,
    pub file: String,
}

/// Describes one orchestration. A bare string converts to a request for that
/// primary file; everything else is layered on with the builder methods.
pub struct LoadRequest {
    /// The primary document file. Its body becomes the incoming snapshot.
    pub file: Option<String>,
    /// Auxiliary data fetches, processed strictly in order before the
    /// primary fetch.
    pub json: Vec<AuxRequest>,
    /// Transitions for this orchestration only, consulted before the
    /// session-wide table.
    pub transitions: TransitionTable,
    /// Whether the incoming snapshot clones its collected elements. The
    /// parsed response is already detached from the live tree, so turning
    /// this off only skips the defensive copy.
    pub frozen: bool,
    pub callback: Option<CompleteCallback>,
}

impl LoadRequest {
    pub fn new() -> LoadRequest {
        LoadRequest {
            file: None,
            json: Vec::new(),
            transitions: TransitionTable::new(),
            frozen: true,
            callback: None,
        }
    }

    pub fn file(mut self, file: &str) -> LoadRequest {
        self.file = Some(file.to_owned());
        self
    }

    /// Shorthand for the conventional view-file path.
    pub fn view(mut self, name: &str) -> LoadRequest {
        self.file = Some(format!("views/{}.html", name));
        self
    }

    /// Adds a sole, default auxiliary fetch whose parsed value becomes the
    /// whole result map.
    pub fn json(self, file: &str) -> LoadRequest {
        self.json_named(DEFAULT_AUX_NAME, file)
    }

    /// Adds a named auxiliary fetch; its parsed value lands under `name` in
    /// the result map.
    pub fn json_named(mut self, name: &str, file: &str) -> LoadRequest {
        self.json.push(AuxRequest {
            name: name.to_owned(),
            file: file.to_owned(),
        });
        self
    }

    pub fn transition<F>(mut self, name: &str, transition: F) -> LoadRequest
    where
        F: Fn(TransitionJob) + Send + Sync + 'static,
    {
        self.transitions.insert(name, transition);
        self
    }

    pub fn frozen(mut self, frozen: bool) -> LoadRequest {
        self.frozen = frozen;
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> LoadRequest
    where
        F: FnOnce(Result<Completion, OrchestrationError>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl Default for LoadRequest {
    fn default() -> LoadRequest {
        LoadRequest::new()
    }
}

impl From<&str> for LoadRequest {
    fn from(file: &str) -> LoadRequest {
        LoadRequest::new().file(file)
    }
}
