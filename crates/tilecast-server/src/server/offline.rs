use anyhow::Context;
use core::time::Duration;
use std::path::Path;
use tilecast::{TileCoord, TilePool};

/// Renders `coord` once and writes the bytes to `output_file`.
///
/// Returns the size of the written tile.
pub async fn render_to_file(
    pool: &TilePool,
    coord: TileCoord,
    output_file: &Path,
    render_timeout: Option<Duration>,
) -> anyhow::Result<usize> {
    let label = coord.to_string();
    let tile = match render_timeout {
        Some(deadline) => pool.render_with_deadline(coord, deadline).await,
        None => pool.render(coord).await,
    }
    .with_context(|| format!("unable to render tile {label}"))?;

    tokio::fs::write(output_file, &tile)
        .await
        .with_context(|| format!("unable to write tile to {}", output_file.display()))?;

    Ok(tile.len())
}
