//! Fixed pool of render workers behind one rendezvous channel.
//!
//! [`TilePool`] owns the sending side of a zero-capacity MPMC channel that all
//! workers receive from. A send only completes when some worker is idle and
//! takes the item, so concurrency is capped at the worker count and excess
//! callers wait as blocked senders instead of piling up in a queue. Every
//! request carries its own oneshot reply channel, which is what ties each
//! result back to the caller that asked for it.
//!
//! Closing the pool means dropping the pool's sender. Senders already blocked
//! in [`TilePool::render`] hold their own clones, so they are still served;
//! once they are gone the channel disconnects and each worker drains out and
//! releases its renderer. Dropping a pool that was never shut down does the
//! same, blocking until every renderer is released.

use crate::{
    coord::TileCoord,
    engine::RenderEngine,
    error::{Error, Result},
    worker::{self, WorkItem},
};
use bytes::Bytes;
use core::{num::NonZeroUsize, time::Duration};
use parking_lot::{Condvar, Mutex, RwLock};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread::JoinHandle,
};
use tokio::sync::oneshot;

/// Settings for [`TilePool::start`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Style source handed to [`RenderEngine::acquire`] for every worker.
    pub style: String,
    /// Number of workers, and therefore of renderer contexts.
    pub worker_count: NonZeroUsize,
}

impl PoolConfig {
    pub fn new(style: impl Into<String>, worker_count: NonZeroUsize) -> Self {
        Self {
            style: style.into(),
            worker_count,
        }
    }
}

/// A started pool of render workers.
pub struct TilePool {
    ingress: RwLock<Option<flume::Sender<WorkItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    drained: Arc<Drained>,
    worker_count: usize,
    busy: Arc<AtomicUsize>,
}

/// Set once every worker thread has been joined.
#[derive(Default)]
struct Drained {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Drained {
    fn set(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }
}

impl TilePool {
    /// Registers the engine and starts `config.worker_count` workers, each
    /// with its own context acquired from `config.style`.
    ///
    /// Workers are started one after another. If any of them fails to
    /// initialize, the ones already running are shut down (releasing their
    /// contexts) before the error is returned.
    ///
    /// This blocks the calling thread while workers initialize.
    ///
    /// # Arguments
    ///
    /// - `config`: Style handed to every worker and the number of workers.
    /// - `engine`: Shared by all workers; each worker acquires its own
    ///   context from it.
    ///
    /// # Errors
    ///
    /// - [`Error::Register`] if [`RenderEngine::register`] failed. No worker
    ///   is started.
    /// - [`Error::Setup`] if a worker could not acquire its context.
    /// - [`Error::Spawn`] if the OS refused to start a worker thread.
    pub fn start<E: RenderEngine>(config: &PoolConfig, engine: E) -> Result<Self> {
        let engine = Arc::new(engine);
        engine.register().map_err(Error::Register)?;

        let style: Arc<str> = Arc::from(config.style.as_str());
        let worker_count = config.worker_count.get();
        let busy = Arc::new(AtomicUsize::new(0));
        let (ingress, rx) = flume::bounded(0);

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match worker::spawn(
                id,
                Arc::clone(&engine),
                Arc::clone(&style),
                rx.clone(),
                Arc::clone(&busy),
            ) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "aborting pool startup");
                    drop(ingress);
                    join_all(workers);
                    return Err(e);
                }
            }
        }

        tracing::info!(workers = worker_count, style = %config.style, "tile pool started");

        Ok(Self {
            ingress: RwLock::new(Some(ingress)),
            workers: Mutex::new(workers),
            drained: Arc::default(),
            worker_count,
            busy,
        })
    }

    /// Renders `coord` on the next idle worker.
    ///
    /// Waits while every worker is busy, then waits for the chosen worker's
    /// reply. Safe to call from any number of tasks at once; no ordering is
    /// promised between waiting callers.
    ///
    /// # Errors
    ///
    /// - [`Error::Render`] if the engine failed on this tile.
    /// - [`Error::PoolClosed`] if [`shutdown`](Self::shutdown) already ran.
    /// - [`Error::WorkerLost`] if the worker died without replying.
    pub async fn render(&self, coord: TileCoord) -> Result<Bytes> {
        let ingress = self.sender()?;
        let (reply, response) = oneshot::channel();

        ingress
            .send_async(WorkItem { coord, reply })
            .await
            .map_err(|_| Error::PoolClosed)?;
        drop(ingress);

        Ok(response.await.map_err(|_| Error::WorkerLost)??)
    }

    /// Like [`render`](Self::render), but gives up after `deadline`.
    ///
    /// The deadline covers both the wait for an idle worker and the render
    /// itself. On expiry the reply channel is dropped:
    ///
    /// - If no worker has taken the request yet, it is withdrawn.
    /// - If a worker took it but has not started, the worker skips it.
    /// - If the render is already running, it completes and the reply is
    ///   discarded. The worker then moves on to the next request.
    ///
    /// # Errors
    ///
    /// - [`Error::DeadlineExceeded`] if `deadline` elapsed first.
    /// - Any error [`render`](Self::render) returns.
    pub async fn render_with_deadline(
        &self,
        coord: TileCoord,
        deadline: Duration,
    ) -> Result<Bytes> {
        tokio::time::timeout(deadline, self.render(coord))
            .await
            .map_err(|_| Error::DeadlineExceeded(deadline))?
    }

    /// Blocking variant of [`render`](Self::render) for callers that are not
    /// running inside an async runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn render_blocking(&self, coord: TileCoord) -> Result<Bytes> {
        let ingress = self.sender()?;
        let (reply, response) = oneshot::channel();

        ingress
            .send(WorkItem { coord, reply })
            .map_err(|_| Error::PoolClosed)?;
        drop(ingress);

        Ok(response.blocking_recv().map_err(|_| Error::WorkerLost)??)
    }

    /// Stops accepting work, lets callers already waiting on the channel
    /// finish, then waits for every worker to release its renderer.
    ///
    /// Later calls do no further work, but still return only once the drain
    /// started by the first call has finished.
    pub async fn shutdown(&self) {
        let drained = Arc::clone(&self.drained);
        let Some(workers) = self.close() else {
            tracing::debug!("tile pool already shutting down, waiting for drain");
            if let Err(e) = tokio::task::spawn_blocking(move || drained.wait()).await {
                tracing::error!(error = %e, "failed to wait for tile pool drain");
            }
            return;
        };

        tracing::info!(workers = workers.len(), "draining tile pool");
        let joined = tokio::task::spawn_blocking(move || {
            join_all(workers);
            drained.set();
        })
        .await;
        if let Err(e) = joined {
            tracing::error!(error = %e, "failed to join tile workers");
            return;
        }
        tracing::info!("tile pool shut down");
    }

    /// Blocking variant of [`shutdown`](Self::shutdown).
    pub fn shutdown_blocking(&self) {
        match self.close() {
            Some(workers) => {
                join_all(workers);
                self.drained.set();
            }
            None => self.drained.wait(),
        }
    }

    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of workers currently inside the engine.
    pub fn busy_workers(&self) -> usize {
        self.busy.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.ingress.read().is_none()
    }

    fn sender(&self) -> Result<flume::Sender<WorkItem>> {
        self.ingress.read().clone().ok_or(Error::PoolClosed)
    }

    /// Drops the pool's sender and hands back the worker threads, or `None`
    /// if that already happened.
    fn close(&self) -> Option<Vec<JoinHandle<()>>> {
        let ingress = self.ingress.write().take()?;
        drop(ingress);
        Some(core::mem::take(&mut *self.workers.lock()))
    }
}

impl Drop for TilePool {
    fn drop(&mut self) {
        if let Some(workers) = self.close() {
            tracing::warn!(
                workers = workers.len(),
                "tile pool dropped without shutdown, releasing renderers"
            );
            join_all(workers);
            self.drained.set();
        }
    }
}

fn join_all(workers: Vec<JoinHandle<()>>) {
    for handle in workers {
        if handle.join().is_err() {
            tracing::error!("tile worker panicked");
        }
    }
}
