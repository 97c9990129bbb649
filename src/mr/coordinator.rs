//! The RPC surface and the dispatcher's two bounded queues. The phase
//! driver that seeds the queues and runs the finalizer lives on
//! `PhaseDriverHandle`, driven by the `mrcoordinator` binary rather than
//! carried on the `CoordinatorServer` value itself: the RPC handlers and
//! the phase driver are independent concurrent tasks sharing only the
//! `Registry` and the queue senders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tarpc::context;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::mr::config::Config;
use crate::mr::finalize;
use crate::mr::registry::Registry;
use crate::mr::watchdog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Map,
    Reduce,
}

/// Reply to `request_task`. `kind == None` covers two distinct cases the
/// worker must tell apart: `terminate == true` is the terminal reply,
/// every task is FINISHED and the worker should exit. `terminate == false`
/// means nothing is immediately dispatchable (a transient empty reply from
/// the coordinator's non-blocking select) and the worker should sleep and
/// retry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskReply {
    pub kind: Option<TaskKind>,
    pub terminate: bool,
    pub filename: Option<String>,
    pub map_index: Option<u32>,
    pub n_reduce: u32,
    pub reduce_index: Option<u32>,
    pub shard_files: Vec<String>,
}

impl TaskReply {
    fn terminal() -> Self {
        Self {
            terminate: true,
            ..Self::default()
        }
    }

    fn empty(n_reduce: u32) -> Self {
        Self {
            n_reduce,
            ..Self::default()
        }
    }
}

/// RPC surface served by the coordinator. All four operations are
/// idempotent at the protocol level.
#[tarpc::service]
pub trait Coordinator {
    /// Atomically claims the next available task, or the terminal reply.
    async fn request_task() -> TaskReply;
    /// Appends an intermediate shard filename for a reduce index.
    async fn report_intermediate(reduce_index: u32, shard_filename: String);
    /// Marks a map task FINISHED.
    async fn finish_map(input_filename: String);
    /// Marks a reduce task FINISHED and records its output filename.
    async fn finish_reduce(reduce_index: u32, output_filename: String);
}

/// Shared queue handles, cloned into every connection's server value so
/// each one's RPC handlers pull from the same dispatcher queues.
#[derive(Clone)]
struct Queues {
    map_tx: mpsc::Sender<String>,
    map_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    reduce_tx: mpsc::Sender<u32>,
    reduce_rx: Arc<Mutex<mpsc::Receiver<u32>>>,
}

#[derive(Clone)]
pub struct CoordinatorServer {
    registry: Registry,
    queues: Queues,
    config: Config,
    done: Arc<AtomicBool>,
}

impl CoordinatorServer {
    /// Builds the server plus the handle the phase driver needs to seed
    /// queues, wait for phase completion, and run the finalizer.
    pub fn new(registry: Registry, config: Config) -> (Self, PhaseDriverHandle) {
        let capacity = queue_capacity(&config);
        let (map_tx, map_rx) = mpsc::channel(capacity);
        let (reduce_tx, reduce_rx) = mpsc::channel(capacity);
        let queues = Queues {
            map_tx: map_tx.clone(),
            map_rx: Arc::new(Mutex::new(map_rx)),
            reduce_tx: reduce_tx.clone(),
            reduce_rx: Arc::new(Mutex::new(reduce_rx)),
        };
        let done = Arc::new(AtomicBool::new(false));
        let server = Self {
            registry: registry.clone(),
            queues,
            config: config.clone(),
            done: done.clone(),
        };
        let handle = PhaseDriverHandle {
            registry,
            config,
            map_tx,
            reduce_tx,
            done,
        };
        (server, handle)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

fn queue_capacity(config: &Config) -> usize {
    // Every task gets exactly one outstanding queue slot at a time, so this
    // only needs to be large enough that seeding the queues never blocks.
    (config.n_reduce as usize).max(16)
}

#[tarpc::server]
impl Coordinator for CoordinatorServer {
    async fn request_task(self, _: context::Context) -> TaskReply {
        if self.done.load(Ordering::Acquire) {
            return TaskReply::terminal();
        }

        if let Ok(filename) = self.queues.map_rx.lock().await.try_recv() {
            if let Some((filename, map_index)) = self.registry.claim_map_named(&filename).await {
                watchdog::watch_map(
                    self.registry.clone(),
                    filename.clone(),
                    self.config.watchdog_deadline,
                    self.queues.map_tx.clone(),
                );
                debug!(filename = %filename, map_index, "dispatched map task");
                return TaskReply {
                    kind: Some(TaskKind::Map),
                    filename: Some(filename),
                    map_index: Some(map_index),
                    n_reduce: self.config.n_reduce,
                    reduce_index: None,
                    shard_files: Vec::new(),
                };
            }
            // Stale queue entry (already claimed/finished elsewhere); fall through.
        }

        if let Ok(reduce_index) = self.queues.reduce_rx.lock().await.try_recv() {
            if let Some((reduce_index, shard_files)) =
                self.registry.claim_reduce_named(reduce_index).await
            {
                watchdog::watch_reduce(
                    self.registry.clone(),
                    reduce_index,
                    self.config.watchdog_deadline,
                    self.queues.reduce_tx.clone(),
                );
                debug!(reduce_index, "dispatched reduce task");
                return TaskReply {
                    kind: Some(TaskKind::Reduce),
                    filename: None,
                    map_index: None,
                    n_reduce: self.config.n_reduce,
                    reduce_index: Some(reduce_index),
                    shard_files,
                };
            }
        }

        // Nothing immediately available; the worker sleeps and retries
        // rather than the handler blocking here.
        TaskReply::empty(self.config.n_reduce)
    }

    async fn report_intermediate(self, _: context::Context, reduce_index: u32, shard_filename: String) {
        self.registry.record_shard(reduce_index, shard_filename).await;
    }

    async fn finish_map(self, _: context::Context, input_filename: String) {
        self.registry.finish_map(&input_filename).await;
    }

    async fn finish_reduce(self, _: context::Context, reduce_index: u32, output_filename: String) {
        self.registry
            .finish_reduce(reduce_index, output_filename)
            .await;
    }
}

/// Held by the binary's phase-driver task: seeds the queues, waits for each
/// phase to complete, and runs the finalizer.
pub struct PhaseDriverHandle {
    registry: Registry,
    config: Config,
    map_tx: mpsc::Sender<String>,
    reduce_tx: mpsc::Sender<u32>,
    done: Arc<AtomicBool>,
}

impl PhaseDriverHandle {
    /// Seed the map queue, wait for all map tasks FINISHED, seed the
    /// reduce queue, wait for all reduce tasks FINISHED, then finalize.
    /// Never seeds the reduce queue before the map phase is complete.
    pub async fn run(self) {
        for filename in self.registry.unallocated_map_filenames().await {
            let _ = self.map_tx.send(filename).await;
        }
        self.poll_until(|| self.registry.map_done()).await;
        info!("map phase complete, entering reduce phase");

        for reduce_index in self.registry.unallocated_reduce_indices().await {
            let _ = self.reduce_tx.send(reduce_index).await;
        }
        self.poll_until(|| self.registry.reduce_done()).await;
        info!("reduce phase complete, running finalizer");

        let outputs = self.registry.reduce_outputs().await;
        match finalize::finalize(&self.config.work_dir, &outputs).await {
            Ok(path) => info!(path = %path, "map-reduce job finished"),
            Err(err) => tracing::error!(error = %err, "finalizer failed"),
        }
        self.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    async fn poll_until<F, Fut>(&self, mut predicate: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        loop {
            if predicate().await {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }
}
