//! Deterministic stand-ins for the native analysis and graphics resources.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{
    AnalyzerConfig, AudioBackend, AudioStreamHandle, AudioTap, ContextState, Result, SceneFrame,
    SceneSurface, VisualiserError,
};

/// Counters shared between a fake backend, its contexts and the test.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeLog {
    opens: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    level: Arc<AtomicU8>,
}

impl FakeLog {
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Value every bin reports from now on.
    pub(crate) fn set_level(&self, level: u8) {
        self.level.store(level, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FakeMode {
    Constant,
    Denied,
    FailingConnect,
}

#[derive(Debug)]
pub(crate) struct FakeBackend {
    mode: FakeMode,
    suspended: bool,
    log: FakeLog,
}

impl FakeBackend {
    /// Contexts whose bins all report `level`.
    pub(crate) fn constant(level: u8, log: &FakeLog) -> Self {
        log.set_level(level);
        Self {
            mode: FakeMode::Constant,
            suspended: false,
            log: log.clone(),
        }
    }

    pub(crate) fn denied(log: &FakeLog) -> Self {
        Self {
            mode: FakeMode::Denied,
            suspended: false,
            log: log.clone(),
        }
    }

    pub(crate) fn failing_connect(log: &FakeLog) -> Self {
        Self {
            mode: FakeMode::FailingConnect,
            suspended: false,
            log: log.clone(),
        }
    }

    pub(crate) fn suspended(mut self) -> Self {
        self.suspended = true;
        self
    }
}

impl AudioBackend for FakeBackend {
    fn open(&mut self, config: &AnalyzerConfig) -> Result<Box<dyn AudioTap>> {
        if self.mode == FakeMode::Denied {
            return Err(VisualiserError::AttachDenied("fake policy".to_string()));
        }
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTap {
            mode: self.mode,
            state: if self.suspended {
                ContextState::Suspended
            } else {
                ContextState::Running
            },
            connected: false,
            bin_count: config.bin_count(),
            log: self.log.clone(),
        }))
    }
}

struct FakeTap {
    mode: FakeMode,
    state: ContextState,
    connected: bool,
    bin_count: usize,
    log: FakeLog,
}

impl AudioTap for FakeTap {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        self.state = ContextState::Running;
        Ok(())
    }

    fn connect(&mut self, _stream: &AudioStreamHandle) -> Result<()> {
        if self.mode == FakeMode::FailingConnect {
            return Err(VisualiserError::AttachDenied("fake connect".to_string()));
        }
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn fill_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        if !self.connected {
            return Err(VisualiserError::InvalidInput("fake tap not connected"));
        }
        out.fill(self.log.level.load(Ordering::SeqCst));
        Ok(())
    }

    fn close(&mut self) {
        if self.state != ContextState::Closed {
            self.log.closes.fetch_add(1, Ordering::SeqCst);
        }
        self.state = ContextState::Closed;
    }
}

/// Surface that records what happened to it.
#[derive(Debug, Default)]
pub(crate) struct FakeSurface {
    pub(crate) size: Option<(u32, u32)>,
    pub(crate) bound: bool,
    pub(crate) refuse_bind: bool,
    pub(crate) fail_draws: bool,
    pub(crate) draws: usize,
    pub(crate) releases: usize,
    pub(crate) last: Option<SceneFrame>,
}

impl FakeSurface {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            size: Some((width, height)),
            ..Self::default()
        }
    }

    pub(crate) fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn refuse_bind(mut self) -> Self {
        self.refuse_bind = true;
        self
    }

    pub(crate) fn failing_draws(mut self) -> Self {
        self.fail_draws = true;
        self
    }
}

impl SceneSurface for FakeSurface {
    fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn bind(&mut self) -> Result<()> {
        if self.refuse_bind {
            return Err(VisualiserError::SurfaceUnavailable(
                "no graphics context".to_string(),
            ));
        }
        self.bound = true;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = Some((width, height));
    }

    fn draw(&mut self, frame: &SceneFrame) -> Result<()> {
        if self.fail_draws {
            return Err(VisualiserError::msg("fake draw failure"));
        }
        self.draws += 1;
        self.last = Some(frame.clone());
        Ok(())
    }

    fn release(&mut self) {
        if self.bound {
            self.releases += 1;
        }
        self.bound = false;
    }
}
