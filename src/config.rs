//! Session configuration.
//!
//! Built once and shared by reference into every component; there is no
//! process-wide state to mutate after a session exists.

use std::sync::Arc;

use crate::collector::ContentTag;
use crate::orchestrator::GlobalComplete;
use crate::snapshot::TransitionTable;

pub struct Config {
    /// Attribute suffix: elements are tagged with `data-<suffix>`.
    pub suffix: String,
    /// Prefix prepended to every fetched file path.
    pub base: Option<String>,
    /// Session-wide transitions, the fallback for per-flash tables.
    pub transitions: TransitionTable,
    /// Invoked after every successful orchestration, in addition to the
    /// per-call callback.
    pub complete: Option<Arc<GlobalComplete>>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            suffix: "load".to_owned(),
            base: None,
            transitions: TransitionTable::new(),
            complete: None,
        }
    }
}

impl Config {
    pub fn tag(&self) -> ContentTag {
        ContentTag::new(&self.suffix)
    }

    pub fn prefixed(&self, file: &str) -> String {
        match &self.base {
            Some(base) => format!("{}/{}", base, file),
            None => file.to_owned(),
        }
    }
}
