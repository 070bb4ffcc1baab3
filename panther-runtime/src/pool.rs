//! Bounded worker pool: a fixed number of workers consuming jobs off a
//! bounded queue, each job dispatched to a per-kind handler.
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use panther_core::Object;

use crate::handlers::Handlers;

/// Minimum worker count enforced regardless of configuration.
pub const MIN_WORKERS: usize = 3;
/// Default worker count when unconfigured.
pub const DEFAULT_WORKERS: usize = 8;
/// Bounded capacity of the job queue.
pub const QUEUE_CAPACITY: usize = 100;
/// How often the background reporter logs worker occupancy.
const REPORT_INTERVAL: Duration = Duration::from_secs(10);
/// Grace period granted to in-flight jobs during [`Pool::close`].
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// A kind-tagged object headed for a handler, optionally marked for garbage
/// collection instead of normal handling.
pub enum Job {
    Host { host: panther_core::Host, gc: bool },
    Scan(panther_core::SystemScan),
    Op(panther_core::HostOperation),
}

impl Job {
    fn kind(&self) -> &'static str {
        match self {
            Job::Host { .. } => panther_core::Host::KIND,
            Job::Scan(_) => panther_core::SystemScan::KIND,
            Job::Op(_) => panther_core::HostOperation::KIND,
        }
    }
}

#[derive(Default)]
struct Counters {
    busy: usize,
    total: usize,
}

/// A cloneable handle used to enqueue jobs from spawned dispatch tasks
/// without holding a reference to the [`Pool`] itself.
#[derive(Clone)]
pub struct JobSender(mpsc::Sender<Job>);

impl JobSender {
    /// Enqueue `job`. A full queue applies back-pressure; a closed queue
    /// (pool shutting down) is swallowed rather than panicking.
    pub async fn send(&self, job: Job) {
        if self.0.send(job).await.is_err() {
            tracing::warn!("dropped job: worker pool is shutting down");
        }
    }
}

/// A bounded pool of workers dispatching [`Job`]s to [`Handlers`].
pub struct Pool {
    tx: mpsc::Sender<Job>,
    counters: Arc<Mutex<Counters>>,
    workers: Vec<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
}

impl Pool {
    /// Start `workers` worker tasks (clamped to [`MIN_WORKERS`]) plus a
    /// periodic state reporter, all driving jobs through `handlers`.
    pub fn new(handlers: Arc<Handlers>, workers: usize) -> Self {
        let workers = workers.max(MIN_WORKERS);
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let counters = Arc::new(Mutex::new(Counters::default()));

        let mut tasks = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = rx.clone();
            let handlers = handlers.clone();
            let counters = counters.clone();
            counters.lock().total += 1;
            tasks.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else { break };
                    counters.lock().busy += 1;
                    let kind = job.kind();
                    tracing::debug!(worker = id, kind, "dispatching job");
                    handlers.dispatch(job).await;
                    counters.lock().busy -= 1;
                }
                counters.lock().total -= 1;
            }));
        }

        let reporter_counters = counters.clone();
        let reporter = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REPORT_INTERVAL);
            loop {
                ticker.tick().await;
                let (busy, total) = {
                    let c = reporter_counters.lock();
                    (c.busy, c.total)
                };
                tracing::debug!(busy, total, "worker pool state");
            }
        });

        Pool {
            tx,
            counters,
            workers: tasks,
            reporter: Some(reporter),
        }
    }

    /// Current `(busy, total)` worker counts.
    pub fn state(&self) -> (usize, usize) {
        let c = self.counters.lock();
        (c.busy, c.total)
    }

    /// Enqueue `job`. A full queue applies back-pressure to the caller; a
    /// closed queue (pool shutting down) is swallowed rather than panicking.
    pub async fn send(&self, job: Job) {
        if self.tx.send(job).await.is_err() {
            tracing::warn!("dropped job: worker pool is shutting down");
        }
    }

    /// A cloneable sender usable from spawned tasks, so a slow dispatch
    /// can't stall the event loop that produced it.
    pub fn sender(&self) -> JobSender {
        JobSender(self.tx.clone())
    }

    /// Close the input queue and wait for workers to drain, up to a 10 s
    /// grace period. Returns `false` if the deadline elapsed first.
    pub async fn close(mut self) -> bool {
        drop(self.tx);
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }
        let drain = async {
            for worker in self.workers.drain(..) {
                let _ = worker.await;
            }
        };
        tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_ok()
    }
}
