//! A debug engine that renders each tile as the GeoJSON outline of its bounds.
//!
//! [`BoundsEngine`] exercises the whole dispatch path without a native
//! renderer: acquiring a context reads the style file (so a bad style path
//! fails startup the same way a real engine would), and every rendered tile is
//! a `FeatureCollection` holding one polygon that covers the tile in WGS84,
//! tagged with the tile address and the style it was rendered with.

use super::{EngineError, RenderEngine};
use crate::coord::TileCoord;
use bytes::Bytes;
use core::f64::consts::PI;
use serde_json::json;
use std::path::Path;

#[derive(Clone, Copy, Debug, Default)]
pub struct BoundsEngine;

/// Per-worker state: the loaded style.
#[derive(Debug)]
pub struct BoundsContext {
    style_name: String,
    style_bytes: usize,
    rendered: u64,
}

impl BoundsContext {
    pub fn style_name(&self) -> &str {
        &self.style_name
    }

    pub const fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl RenderEngine for BoundsEngine {
    type Context = BoundsContext;

    fn acquire(&self, style: &str) -> Result<BoundsContext, EngineError> {
        let path = Path::new(style);
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::new(format!("unable to load style {style}: {e}")))?;
        if contents.trim().is_empty() {
            return Err(EngineError::new(format!("style {style} is empty")));
        }

        let style_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(style)
            .to_string();

        Ok(BoundsContext {
            style_name,
            style_bytes: contents.len(),
            rendered: 0,
        })
    }

    fn render_tile(
        &self,
        context: &mut BoundsContext,
        coord: &TileCoord,
    ) -> Result<Bytes, EngineError> {
        let (west, south, east, north) = lonlat_bounds(coord);
        context.rendered += 1;

        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [west, south],
                        [east, south],
                        [east, north],
                        [west, north],
                        [west, south],
                    ]],
                },
                "properties": {
                    "z": coord.zoom(),
                    "x": coord.x(),
                    "y": coord.y(),
                    "style": context.style_name,
                    "style_bytes": context.style_bytes,
                },
            }],
        });

        serde_json::to_vec(&doc)
            .map(Bytes::from)
            .map_err(|e| EngineError::new(format!("unable to encode {coord}: {e}")))
    }
}

/// Web Mercator tile bounds as `(west, south, east, north)` in degrees.
pub fn lonlat_bounds(coord: &TileCoord) -> (f64, f64, f64, f64) {
    let n = f64::from(coord.bound());
    let lon = |x: u32| f64::from(x) / n * 360.0 - 180.0;
    let lat = |y: u32| (PI * (1.0 - 2.0 * f64::from(y) / n)).sinh().atan().to_degrees();

    let x = coord.x();
    let y = coord.y();
    (lon(x), lat(y + 1), lon(x + 1), lat(y))
}
