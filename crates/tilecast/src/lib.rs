//! Tile request dispatch over a fixed pool of exclusive renderer contexts.
//!
//! Rendering engines such as Mapnik keep a per-map context that must never be
//! touched from two threads at once. `tilecast` owns a fixed number of those
//! contexts, one per worker thread, and funnels every render request through a
//! single rendezvous channel so that:
//!
//! - at most `worker_count` renders run at any moment (excess callers wait),
//! - each reply reaches exactly the caller that asked for it,
//! - every context is released exactly once, including on failed startup.
//!
//! ```ignore
//! let config = PoolConfig::new("style.xml", NonZeroUsize::new(4).unwrap());
//! let pool = TilePool::start(&config, engine)?;
//! let coord: TileCoord = "/3/2/1.pbf".parse()?;
//! let tile = pool.render(coord).await?;
//! pool.shutdown().await;
//! ```

mod coord;
pub mod engine;
mod error;
mod pool;
mod worker;

pub use crate::coord::*;
pub use crate::engine::{EngineError, RenderEngine, RendererHandle};
pub use crate::error::*;
pub use crate::pool::*;
pub use crate::worker::{RenderResult, WorkItem};
