//! Demand-driven simulation runner with last-write-wins semantics.
//!
//! Every submission supersedes the previous one: the in-flight task is
//! aborted and, should it still finish, its result is dropped. Subscribers
//! only ever observe the latest run.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SimulationError;
use crate::orchestrator::Simulator;
use crate::position::SimulationInput;
use crate::result::SimulationResult;
use crate::snapshot::SnapshotLoader;

/// Output of one run, tagged with its generation.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub generation: u64,
    pub result: Result<Arc<SimulationResult>, SimulationError>,
}

/// Spawns simulation runs and publishes the latest result.
pub struct SimulationRunner {
    simulator: Arc<Simulator>,
    loader: Option<Arc<SnapshotLoader>>,
    generation: Arc<AtomicU64>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    tx: Arc<watch::Sender<Option<RunOutput>>>,
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

impl SimulationRunner {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            simulator,
            loader: None,
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
            tx: Arc::new(tx),
        }
    }

    /// Attach a snapshot loader so runs can be triggered by user address.
    pub fn with_loader(mut self, loader: Arc<SnapshotLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Receive every published result.
    pub fn subscribe(&self) -> watch::Receiver<Option<RunOutput>> {
        self.tx.subscribe()
    }

    /// Latest published output, if any.
    pub fn latest(&self) -> Option<RunOutput> {
        self.tx.borrow().clone()
    }

    /// Run the waterfall on an already loaded snapshot.
    pub fn submit(&self, input: SimulationInput) -> u64 {
        let simulator = Arc::clone(&self.simulator);
        self.spawn(move || async move { Ok(simulator.simulate(&input).await) })
    }

    /// Load a fresh snapshot for `user` and run the waterfall on it.
    ///
    /// Without a loader the run publishes a `MissingInput` error.
    pub fn refresh(&self, user: impl Into<String>) -> u64 {
        let user = user.into();
        let simulator = Arc::clone(&self.simulator);
        let loader = self.loader.clone();
        self.spawn(move || async move {
            let loader = loader.ok_or_else(|| {
                SimulationError::MissingInput("no snapshot loader configured".to_string())
            })?;
            let input = loader.load(&user).await?;
            Ok(simulator.simulate(&input).await)
        })
    }

    /// Abort whatever is in flight and publish nothing further.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.in_flight.lock().take() {
            handle.abort();
        }
    }

    fn spawn<F, Fut>(&self, make_run: F) -> u64
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<SimulationResult, SimulationError>> + Send + 'static,
    {
        let mut in_flight = self.in_flight.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(previous) = in_flight.take() {
            if !previous.is_finished() {
                debug!(generation, "Abandoning superseded simulation run");
            }
            previous.abort();
        }

        let run = make_run();
        let latest = Arc::clone(&self.generation);
        let tx = Arc::clone(&self.tx);

        *in_flight = Some(tokio::spawn(async move {
            let result = run.await.map(Arc::new);

            if latest.load(Ordering::SeqCst) != generation {
                debug!(generation, "Discarding result of superseded run");
                return;
            }

            tx.send_if_modified(|current| {
                let newer_published = current
                    .as_ref()
                    .map_or(false, |c| c.generation > generation);
                if newer_published {
                    return false;
                }
                *current = Some(RunOutput { generation, result });
                true
            });
        }));

        generation
    }
}
