use crate::{
    coord::TileCoord,
    engine::{EngineError, RenderEngine, RendererHandle},
    error::Error,
};
use bytes::Bytes;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};
use tokio::sync::oneshot;

/// Outcome of one render: the encoded tile, or the engine's error.
pub type RenderResult = Result<Bytes, EngineError>;

/// One pending render request and the single-use channel its answer goes to.
#[derive(Debug)]
pub struct WorkItem {
    pub coord: TileCoord,
    pub reply: oneshot::Sender<RenderResult>,
}

/// A dedicated thread bound to one renderer context for its whole life.
///
/// The worker pulls [`WorkItem`]s off the shared ingress channel one at a time,
/// so its context is never used concurrently. When every sender of the ingress
/// channel is gone and nothing is left to drain, the loop ends and the
/// [`RendererHandle`] is dropped, releasing the context.
struct Worker<E: RenderEngine> {
    id: usize,
    ingress: flume::Receiver<WorkItem>,
    renderer: RendererHandle<E>,
    busy: Arc<AtomicUsize>,
}

impl<E: RenderEngine> Worker<E> {
    /// Serves requests until the ingress channel disconnects.
    ///
    /// # Request Handling
    ///
    /// - Reply already closed: the caller gave up, the item is skipped without
    ///   touching the engine.
    /// - Render succeeded or failed: the result goes to that item's reply
    ///   channel only. A failure is logged and the worker keeps serving.
    fn run(mut self) {
        tracing::debug!(worker = self.id, "worker ready");

        while let Ok(WorkItem { coord, reply }) = self.ingress.recv() {
            // The caller gave up between hand-off and now; nobody will read
            // the result.
            if reply.is_closed() {
                tracing::debug!(worker = self.id, %coord, "skipping abandoned request");
                continue;
            }

            self.busy.fetch_add(1, Ordering::Relaxed);
            let result = self.renderer.render(&coord);
            self.busy.fetch_sub(1, Ordering::Relaxed);

            if let Err(e) = &result {
                tracing::warn!(worker = self.id, %coord, error = %e, "render failed");
            }

            if reply.send(result).is_err() {
                tracing::debug!(worker = self.id, %coord, "caller abandoned reply");
            }
        }

        tracing::debug!(worker = self.id, "ingress closed, releasing renderer");
    }
}

/// Starts worker `id` on its own thread and waits for it to become ready.
///
/// The renderer context is acquired on the worker thread itself, so it never
/// crosses threads. If acquisition fails the thread exits immediately and the
/// error is returned here; nothing is left running.
///
/// Once ready, the worker serves [`WorkItem`]s until every sender of
/// `ingress` is dropped and the channel is empty, then releases its context.
///
/// # Arguments
///
/// - `id`: Worker index, used in the thread name (`tile-worker-{id}`) and in
///   logs.
/// - `engine`: Engine the context is acquired from and rendered with.
/// - `style`: Style passed to [`RenderEngine::acquire`].
/// - `ingress`: Shared receiving side of the pool's rendezvous channel.
/// - `busy`: Pool-wide count of workers currently inside the engine.
///
/// # Errors
///
/// - [`Error::Spawn`] if the thread could not be created.
/// - [`Error::Setup`] if the context could not be acquired, or acquisition
///   panicked.
pub(crate) fn spawn<E: RenderEngine>(
    id: usize,
    engine: Arc<E>,
    style: Arc<str>,
    ingress: flume::Receiver<WorkItem>,
    busy: Arc<AtomicUsize>,
) -> Result<JoinHandle<()>, Error> {
    let (ready_tx, ready_rx) = flume::bounded::<Result<(), EngineError>>(1);

    let handle = thread::Builder::new()
        .name(format!("tile-worker-{id}"))
        .spawn(move || {
            let renderer = match RendererHandle::acquire(engine, &style) {
                Ok(renderer) => renderer,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // The starter may have already given up; the worker still runs
            // until ingress closes.
            let _ = ready_tx.send(Ok(()));

            Worker {
                id,
                ingress,
                renderer,
                busy,
            }
            .run();
        })
        .map_err(|error| Error::Spawn { worker: id, error })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(error)) => {
            let _ = handle.join();
            Err(Error::Setup { worker: id, error })
        }
        Err(_) => {
            // The sender was dropped without a message: acquire panicked.
            let _ = handle.join();
            Err(Error::Setup {
                worker: id,
                error: EngineError::new("worker panicked during initialization"),
            })
        }
    }
}
