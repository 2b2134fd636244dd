use bytes::Bytes;
use core::{hint::black_box, num::NonZeroUsize};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::join_all;
use tilecast::{EngineError, PoolConfig, RenderEngine, TileCoord, TilePool};
use tokio::runtime::Builder;

/// Engine whose render cost is a fixed spin, so the numbers reflect dispatch
/// overhead rather than rendering.
struct SpinEngine {
    iterations: u32,
}

impl RenderEngine for SpinEngine {
    type Context = u64;

    fn acquire(&self, _style: &str) -> Result<u64, EngineError> {
        Ok(0)
    }

    fn render_tile(&self, acc: &mut u64, coord: &TileCoord) -> Result<Bytes, EngineError> {
        for i in 0..self.iterations {
            *acc = acc.wrapping_mul(31).wrapping_add(u64::from(i ^ coord.x()));
        }
        Ok(Bytes::copy_from_slice(&acc.to_le_bytes()))
    }
}

fn bench_render(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let coords: Vec<TileCoord> = (0..256_u32)
        .map(|i| TileCoord::new(12, i64::from(i), i64::from(i), "pbf").unwrap())
        .collect();

    let mut group = c.benchmark_group("tile_pool");
    group.throughput(Throughput::Elements(coords.len() as u64));

    for workers in [1, 2, 4, 8] {
        let config = PoolConfig::new("bench", NonZeroUsize::new(workers).unwrap());
        let pool = TilePool::start(&config, SpinEngine { iterations: 1_000 }).unwrap();

        group.bench_function(format!("render/{workers}_workers"), |b| {
            b.to_async(&rt).iter(|| async {
                let tiles = join_all(coords.iter().cloned().map(|c| pool.render(c))).await;
                black_box(tiles);
            });
        });

        pool.shutdown_blocking();
    }

    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
