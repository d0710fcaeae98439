//! Ties everything together: the live document, its long-lived flash, the
//! change feed, and the orchestrator worker that services load requests.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::change_feed::{ChangeFeed, StoreChange};
use crate::config::Config;
use crate::dom::{Document, SharedDocument};
use crate::orchestrator::Orchestrator;
use crate::parser::FragmentParser;
use crate::request::LoadRequest;
use crate::snapshot::{Flash, FlashOptions, TransitionTable};
use crate::transport::Transport;

/// One running engine over one live document.
///
/// Dropping the session shuts down the orchestrator thread; any load still
/// in flight is abandoned.
pub struct Session {
    start_time: Instant,
    config: Arc<Config>,
    doc: SharedDocument,
    live: Arc<Mutex<Flash>>,
    feed: Arc<ChangeFeed<StoreChange>>,
    orchestrator: Orchestrator,
}

impl Session {
    pub fn new(
        config: Config,
        document: Document,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn FragmentParser>,
    ) -> Session {
        let start_time = Instant::now();

        let config = Arc::new(config);
        let doc = document.into_shared();
        let feed = Arc::new(ChangeFeed::new());

        // The live flash is never frozen: its stores must own the real
        // elements so commits mutate the live tree.
        let live = Arc::new(Mutex::new(Flash::new(FlashOptions {
            doc: Arc::clone(&doc),
            root: None,
            frozen: false,
            tag: config.tag(),
            transitions: TransitionTable::new(),
            fallback_transitions: config.transitions.clone(),
            feed: Arc::clone(&feed),
        })));

        let orchestrator = Orchestrator::start(
            Arc::clone(&config),
            Arc::clone(&live),
            Arc::clone(&feed),
            transport,
            parser,
        );

        log::trace!("Session started");

        Session {
            start_time,
            config,
            doc,
            live,
            feed,
            orchestrator,
        }
    }

    /// Enqueues one orchestration. Supersedes any load still in flight.
    pub fn load<R: Into<LoadRequest>>(&self, request: R) {
        self.orchestrator.submit(request.into());
    }

    pub fn flash_handle(&self) -> Arc<Mutex<Flash>> {
        Arc::clone(&self.live)
    }

    pub fn document(&self) -> SharedDocument {
        Arc::clone(&self.doc)
    }

    pub fn changes(&self) -> Arc<ChangeFeed<StoreChange>> {
        Arc::clone(&self.feed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }
}
