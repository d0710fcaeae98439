//! Defines the process by which one orchestration runs: the auxiliary fetch
//! queue, the primary fetch, the incoming snapshot, and the diff/commit
//! against the live flash.
//!
//! This object is owned by a Session. Orchestrations run on a dedicated
//! worker thread, strictly one at a time; submitting a new one supersedes
//! whatever is still in flight, whose completion handlers then become
//! no-ops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{select, Receiver, Sender};
use futures::executor::block_on;
use serde_json::{Map, Value};

use crate::change_feed::{ChangeFeed, StoreChange};
use crate::config::Config;
use crate::error::OrchestrationError;
use crate::parser::FragmentParser;
use crate::request::{AuxRequest, LoadRequest, DEFAULT_AUX_NAME};
use crate::snapshot::{Flash, FlashOptions, TransitionTable};
use crate::transport::{FetchRequest, Transport};

/// Delivered to callbacks when an orchestration completes: the refreshed
/// live flash and the cumulative auxiliary result map.
pub struct Completion {
    pub flash: Arc<Mutex<Flash>>,
    pub data: Value,
}

pub type CompleteCallback = Box<dyn FnOnce(Result<Completion, OrchestrationError>) + Send>;
pub type GlobalComplete = dyn Fn(&Completion) + Send + Sync;

pub struct Orchestrator {
    job_sender: Sender<Job>,
    shutdown_sender: Sender<()>,
    latest_epoch: Arc<AtomicU64>,
    transport: Arc<dyn Transport>,
    _thread_handle: jod_thread::JoinHandle<()>,
}

struct Job {
    epoch: u64,
    request: LoadRequest,
}

impl Orchestrator {
    pub fn start(
        config: Arc<Config>,
        live: Arc<Mutex<Flash>>,
        feed: Arc<ChangeFeed<StoreChange>>,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn FragmentParser>,
    ) -> Self {
        let (job_sender, job_receiver) = crossbeam_channel::unbounded();
        let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded(1);
        let latest_epoch = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            config,
            live,
            feed,
            transport: Arc::clone(&transport),
            parser,
            latest_epoch: Arc::clone(&latest_epoch),
        };

        let thread_handle = jod_thread::Builder::new()
            .name("Orchestrator thread".to_owned())
            .spawn(move || {
                log::trace!("Orchestrator thread started");
                main_task(job_receiver, shutdown_receiver, worker);
                log::trace!("Orchestrator thread stopped");
            })
            .expect("Could not start Orchestrator thread");

        Self {
            job_sender,
            shutdown_sender,
            latest_epoch,
            transport,
            _thread_handle: thread_handle,
        }
    }

    /// Enqueues an orchestration. Any orchestration still in flight is
    /// superseded: its transport operation is told to abort and its
    /// completion handlers become no-ops.
    pub fn submit(&self, request: LoadRequest) {
        let epoch = self.latest_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        self.transport.abort_in_flight();

        log::trace!("Submitting orchestration {}", epoch);
        let _ = self.job_sender.send(Job { epoch, request });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let _ = self.shutdown_sender.send(());
    }
}

fn main_task(job_receiver: Receiver<Job>, shutdown_receiver: Receiver<()>, worker: Worker) {
    loop {
        select! {
            recv(job_receiver) -> job => {
                match job {
                    Ok(job) => worker.process(job),
                    Err(_) => break,
                }
            },
            recv(shutdown_receiver) -> _ => {
                log::trace!("Orchestrator shutdown signal received...");
                break;
            },
        }
    }
}

struct Worker {
    config: Arc<Config>,
    live: Arc<Mutex<Flash>>,
    feed: Arc<ChangeFeed<StoreChange>>,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn FragmentParser>,
    latest_epoch: Arc<AtomicU64>,
}

impl Worker {
    fn superseded(&self, epoch: u64) -> bool {
        self.latest_epoch.load(Ordering::SeqCst) != epoch
    }

    fn process(&self, job: Job) {
        let Job { epoch, request } = job;
        let LoadRequest {
            file,
            json,
            transitions,
            frozen,
            callback,
        } = request;

        log::trace!("Processing orchestration {}", epoch);

        let outcome = self.orchestrate(epoch, file.as_deref(), &json, transitions, frozen);

        // A stale job observes nothing, not even its own failure.
        if self.superseded(epoch) {
            log::trace!("Orchestration {} superseded; results discarded", epoch);
            return;
        }

        match outcome {
            Ok(Some(data)) => {
                let completion = Completion {
                    flash: Arc::clone(&self.live),
                    data,
                };

                if let Some(complete) = &self.config.complete {
                    complete(&completion);
                }

                if let Some(callback) = callback {
                    callback(Ok(completion));
                }
            }
            Ok(None) => {
                log::trace!("Orchestration {} superseded; results discarded", epoch);
            }
            Err(err) => {
                log::error!("Orchestration {} failed: {}", epoch, err);

                if let Some(callback) = callback {
                    callback(Err(err));
                }
            }
        }
    }

    /// Runs one orchestration to completion. `Ok(None)` means the job was
    /// superseded along the way and nothing may be reported.
    fn orchestrate(
        &self,
        epoch: u64,
        file: Option<&str>,
        json: &[AuxRequest],
        transitions: TransitionTable,
        frozen: bool,
    ) -> Result<Option<Value>, OrchestrationError> {
        let mut results = Value::Object(Map::new());

        // Nothing to fetch at all: immediate success, the transport is
        // never touched.
        if file.is_none() && json.is_empty() {
            return Ok(Some(results));
        }

        // Auxiliary requests run strictly one at a time, in order. A request
        // only starts once the previous one has finished.
        for aux in json {
            if self.superseded(epoch) {
                return Ok(None);
            }

            let (url, body) = self.fetch(&aux.file)?;

            if self.superseded(epoch) {
                return Ok(None);
            }

            let parsed: Value = serde_json::from_str(&body)
                .map_err(|source| OrchestrationError::malformed_data(source, &url))?;

            if aux.name == DEFAULT_AUX_NAME {
                results = parsed;
            } else {
                match &mut results {
                    Value::Object(map) => {
                        map.insert(aux.name.clone(), parsed);
                    }
                    _ => {
                        let mut map = Map::new();
                        map.insert(aux.name.clone(), parsed);
                        results = Value::Object(map);
                    }
                }
            }
        }

        // The primary fetch happens strictly after the auxiliary queue has
        // drained.
        if let Some(file) = file {
            if self.superseded(epoch) {
                return Ok(None);
            }

            let (_, body) = self.fetch(file)?;

            if self.superseded(epoch) {
                return Ok(None);
            }

            let incoming = Flash::new(FlashOptions {
                doc: self.parser.parse(&body).into_shared(),
                root: None,
                frozen,
                tag: self.config.tag(),
                transitions: TransitionTable::new(),
                fallback_transitions: TransitionTable::new(),
                feed: Arc::clone(&self.feed),
            });

            let receiver = {
                let mut live = self.live.lock().unwrap();

                // Re-organize with this orchestration's transitions so the
                // stores about to commit resolve against them.
                live.set_transitions(transitions);
                live.update();

                live.generate(&incoming).run(None)
            };

            if block_on(receiver).is_err() {
                log::warn!(
                    "A transition dropped its completion handle; \
                     orchestration {} may have committed partially",
                    epoch
                );
            }

            if self.superseded(epoch) {
                return Ok(None);
            }

            self.live.lock().unwrap().update();
        }

        Ok(Some(results))
    }

    fn fetch(&self, file: &str) -> Result<(String, String), OrchestrationError> {
        let url = self.config.prefixed(file);
        log::trace!("Fetching {}", url);

        let response = self
            .transport
            .fetch(&FetchRequest::new(&url))
            .map_err(|source| OrchestrationError::io(source, &url))?;

        if !response.is_success(&url) {
            return Err(OrchestrationError::fetch_failed(&url, response.status));
        }

        Ok((url, response.body))
    }
}
