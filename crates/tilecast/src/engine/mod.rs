//! The seam between the dispatch pool and an external rendering engine.
//!
//! The pool never looks inside a renderer context. It needs exactly four things
//! from an engine: a one-time registration step, a way to acquire a context for
//! a style, a way to render one tile with that context, and a way to release
//! it. [`RenderEngine`] captures those; [`RendererHandle`] is the single owner
//! that guarantees the release happens exactly once.

#[cfg(feature = "geojson")]
pub mod geojson;
mod handle;

pub use handle::RendererHandle;

use crate::coord::TileCoord;
use bytes::Bytes;
use core::fmt;

/// An opaque failure reported by the rendering engine.
///
/// Engines wrap whatever their native error is into a message; the pool only
/// ever forwards it to the one caller that triggered it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A rendering engine whose per-style contexts are not safe for concurrent use.
///
/// The engine value itself is shared by every worker and must be `Sync`. The
/// [`Context`](RenderEngine::Context) it hands out is not: each context is
/// acquired on the worker thread that will use it and never leaves that thread,
/// so it need not be `Send` either.
pub trait RenderEngine: Send + Sync + 'static {
    /// One loaded map/style instance.
    type Context;

    /// Process-wide setup (datasource plugins and the like). Called once per
    /// pool, before any context is acquired.
    fn register(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Creates a fresh context for `style`.
    ///
    /// If acquisition fails half way, the engine must clean up whatever it
    /// already allocated before returning the error; the pool never sees a
    /// partial context.
    fn acquire(&self, style: &str) -> Result<Self::Context, EngineError>;

    /// Renders one tile. Called many times on the same context, never
    /// concurrently.
    fn render_tile(&self, context: &mut Self::Context, coord: &TileCoord)
    -> Result<Bytes, EngineError>;

    /// Frees a context. Called exactly once per successful
    /// [`acquire`](RenderEngine::acquire).
    fn release(&self, context: Self::Context) {
        drop(context);
    }
}
