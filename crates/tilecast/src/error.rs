//! Error types for coordinate parsing and tile dispatch.
//!
//! [`ParseError`] covers malformed or out-of-range client paths and is never
//! retried. [`Error`] covers everything that can happen between a caller and a
//! worker: startup failures, render failures reported by the engine, and the
//! pool-lifecycle conditions (closed pool, lost worker, missed deadline).

use crate::engine::EngineError;
use core::time::Duration;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Rejection of an inbound `/{zoom}/{x}/{y}.{format}` path.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The path does not have the `/z/x/y.fmt` shape.
    #[error("Expecting a path of format /z/x/y.fmt, but didn't match it.")]
    MalformedPath,

    #[error("Zoom level must be non-negative.")]
    InvalidZoom,

    /// The zoom exceeds [`crate::MAX_ZOOM`].
    #[error("Zoom levels > 30 are not supported.")]
    ZoomTooLarge,

    #[error("X and Y coordinates must be non-negative.")]
    NegativeCoordinate,

    #[error("X coordinate out of range at this zoom.")]
    XOutOfRange,

    #[error("Y coordinate out of range at this zoom.")]
    YOutOfRange,
}

/// Unified error type for the dispatch pool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine's process-wide registration step failed.
    #[error("failed to register engine: {0}")]
    Register(EngineError),

    /// A worker could not acquire its renderer context.
    #[error("worker {worker} failed to initialize: {error}")]
    Setup { worker: usize, error: EngineError },

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker {worker}: {error}")]
    Spawn {
        worker: usize,
        error: std::io::Error,
    },

    /// The engine reported a failure for this tile.
    #[error(transparent)]
    Render(#[from] EngineError),

    /// The pool has been shut down and no longer accepts work.
    #[error("tile pool is shut down")]
    PoolClosed,

    /// The worker holding this request went away without replying.
    #[error("worker terminated before replying")]
    WorkerLost,

    #[error("render did not complete within {0:?}")]
    DeadlineExceeded(Duration),
}

impl Error {
    /// Whether this error happened while the pool was being built.
    pub const fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::Register(_) | Self::Setup { .. } | Self::Spawn { .. }
        )
    }
}
