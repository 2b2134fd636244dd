#![allow(dead_code)]

use bytes::Bytes;
use core::time::Duration;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tilecast::{EngineError, RenderEngine, TileCoord};

#[derive(Debug, Default)]
pub struct Stats {
    pub attempts: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub rendered: AtomicUsize,
}

impl Stats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }
}

/// Stand-in engine that counts acquire/release, reports every render it
/// starts, and can hold renders until the test lets them through.
///
/// Payloads are `"{context}|{coord}"`, so callers can check that they got
/// their own tile back. Format `fail` yields an engine error and format
/// `panic` panics inside the engine.
pub struct ScriptedEngine {
    stats: Arc<Stats>,
    entered: flume::Sender<TileCoord>,
    gate: flume::Receiver<()>,
    gated: bool,
    fail_register: bool,
    fail_acquire_at: Option<usize>,
}

/// The test's side of a [`ScriptedEngine`].
pub struct Probe {
    pub stats: Arc<Stats>,
    entered: flume::Receiver<TileCoord>,
    gate: flume::Sender<()>,
}

impl ScriptedEngine {
    pub fn new() -> (Self, Probe) {
        let stats = Arc::new(Stats::default());
        let (entered_tx, entered_rx) = flume::unbounded();
        let (gate_tx, gate_rx) = flume::unbounded();

        let engine = Self {
            stats: Arc::clone(&stats),
            entered: entered_tx,
            gate: gate_rx,
            gated: false,
            fail_register: false,
            fail_acquire_at: None,
        };
        let probe = Probe {
            stats,
            entered: entered_rx,
            gate: gate_tx,
        };
        (engine, probe)
    }

    /// Every render blocks until [`Probe::open`] lets it through.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// The `n`th acquire attempt (0-based) fails.
    pub fn fail_acquire_at(mut self, n: usize) -> Self {
        self.fail_acquire_at = Some(n);
        self
    }

    pub fn fail_register(mut self) -> Self {
        self.fail_register = true;
        self
    }
}

impl RenderEngine for ScriptedEngine {
    type Context = usize;

    fn register(&self) -> Result<(), EngineError> {
        if self.fail_register {
            return Err(EngineError::new("no datasources"));
        }
        Ok(())
    }

    fn acquire(&self, style: &str) -> Result<usize, EngineError> {
        let attempt = self.stats.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire_at == Some(attempt) {
            return Err(EngineError::new(format!("cannot load {style}")));
        }
        Ok(self.stats.acquired.fetch_add(1, Ordering::SeqCst))
    }

    fn render_tile(&self, context: &mut usize, coord: &TileCoord) -> Result<Bytes, EngineError> {
        let _ = self.entered.send(coord.clone());
        if self.gated {
            let _ = self.gate.recv();
        }
        self.stats.rendered.fetch_add(1, Ordering::SeqCst);

        match coord.format() {
            "fail" => Err(EngineError::new(format!("cannot render {coord}"))),
            "panic" => panic!("engine blew up on {coord}"),
            _ => Ok(Bytes::from(format!("{context}|{coord}"))),
        }
    }

    fn release(&self, _context: usize) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Probe {
    /// Waits for the next render to start.
    pub async fn next_entered(&self) -> TileCoord {
        tokio::time::timeout(Duration::from_secs(5), self.entered.recv_async())
            .await
            .expect("no render started within 5s")
            .expect("engine dropped")
    }

    /// Asserts that no render starts within `window`.
    pub async fn assert_quiet(&self, window: Duration) {
        tokio::time::sleep(window).await;
        assert!(
            self.entered.try_recv().is_err(),
            "a render started unexpectedly"
        );
    }

    /// Lets `n` gated renders finish.
    pub fn open(&self, n: usize) {
        for _ in 0..n {
            self.gate.send(()).unwrap();
        }
    }
}

/// Counters shared between an [`ExclusiveEngine`] and the test.
#[derive(Debug, Default)]
pub struct Exclusivity {
    pub overlaps: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub rendered: AtomicUsize,
}

/// Engine whose contexts flag themselves busy for the length of a render.
///
/// Entering a render on a context that is already busy, or releasing one
/// mid-render, counts as an overlap.
pub struct ExclusiveEngine {
    stats: Arc<Exclusivity>,
    render_time: Duration,
}

impl ExclusiveEngine {
    pub fn new(render_time: Duration) -> (Self, Arc<Exclusivity>) {
        let stats = Arc::new(Exclusivity::default());
        let engine = Self {
            stats: Arc::clone(&stats),
            render_time,
        };
        (engine, stats)
    }
}

impl RenderEngine for ExclusiveEngine {
    type Context = Arc<AtomicBool>;

    fn acquire(&self, _style: &str) -> Result<Arc<AtomicBool>, EngineError> {
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(AtomicBool::new(false)))
    }

    fn render_tile(
        &self,
        in_use: &mut Arc<AtomicBool>,
        coord: &TileCoord,
    ) -> Result<Bytes, EngineError> {
        if in_use.swap(true, Ordering::SeqCst) {
            self.stats.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(self.render_time);
        self.stats.rendered.fetch_add(1, Ordering::SeqCst);
        in_use.store(false, Ordering::SeqCst);
        Ok(Bytes::from(coord.to_string()))
    }

    fn release(&self, in_use: Arc<AtomicBool>) {
        if in_use.load(Ordering::SeqCst) {
            self.stats.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn coord(path: &str) -> TileCoord {
    TileCoord::parse(path).unwrap()
}

pub fn payload(bytes: &Bytes) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}
