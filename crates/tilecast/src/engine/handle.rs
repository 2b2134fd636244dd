use super::{EngineError, RenderEngine};
use crate::coord::TileCoord;
use bytes::Bytes;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

/// Exclusive owner of one renderer context.
///
/// The context is released through [`RenderEngine::release`] when the handle
/// is dropped, which makes "released exactly once" a property of ownership
/// rather than of every exit path remembering to clean up.
pub struct RendererHandle<E: RenderEngine> {
    engine: Arc<E>,
    context: Option<E::Context>,
}

impl<E: RenderEngine> RendererHandle<E> {
    /// Acquires a context for `style`.
    pub fn acquire(engine: Arc<E>, style: &str) -> Result<Self, EngineError> {
        let context = engine.acquire(style)?;
        Ok(Self {
            engine,
            context: Some(context),
        })
    }

    /// Renders `coord` with the owned context.
    ///
    /// A panic inside the engine is caught and reported as an [`EngineError`]
    /// so that one bad tile cannot take the worker down with it.
    pub fn render(&mut self, coord: &TileCoord) -> Result<Bytes, EngineError> {
        let Some(context) = self.context.as_mut() else {
            return Err(EngineError::new("renderer context already released"));
        };
        let engine = &self.engine;

        match catch_unwind(AssertUnwindSafe(|| engine.render_tile(context, coord))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(EngineError::new(format!(
                    "renderer panicked on {coord}: {reason}"
                )))
            }
        }
    }
}

impl<E: RenderEngine> Drop for RendererHandle<E> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.engine.release(context);
        }
    }
}
