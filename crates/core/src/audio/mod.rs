use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::{AnalyzerConfig, FrequencySnapshot, Result, VisualiserError};

mod tap;

pub use tap::{AudioBackend, AudioTap, ContextState, SoftwareBackend, SoftwareTap};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one playing stream. A new track gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

/// Thread-safe ring of the most recent time-domain samples of a stream.
///
/// Playback writes into it; analysis taps read copies out of it. Reading never
/// consumes samples, so tapping cannot starve the playback path.
#[derive(Clone)]
pub struct SignalBuffer {
    shared: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl SignalBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends samples, discarding the oldest ones beyond capacity.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() || self.capacity == 0 {
            return Ok(());
        }

        let mut ring = self.lock()?;
        let keep = samples.len().min(self.capacity);
        let overflow = (ring.len() + keep).saturating_sub(self.capacity);
        ring.drain(..overflow);
        ring.extend(&samples[samples.len() - keep..]);
        Ok(())
    }

    /// Copies the newest `out.len()` samples into `out`, zero-padding at the
    /// front when fewer are buffered. Returns how many real samples were
    /// copied.
    pub fn copy_latest(&self, out: &mut [f32]) -> Result<usize> {
        let ring = self.lock()?;
        let available = ring.len().min(out.len());
        let pad = out.len() - available;
        out[..pad].iter_mut().for_each(|sample| *sample = 0.0);
        for (slot, sample) in out[pad..].iter_mut().zip(ring.range(ring.len() - available..)) {
            *slot = *sample;
        }
        Ok(available)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<f32>>> {
        self.shared
            .lock()
            .map_err(|_| VisualiserError::msg("signal buffer has been poisoned"))
    }
}

impl std::fmt::Debug for SignalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBuffer")
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Reference to one decodable audio source owned by the playback side.
///
/// Cloning is cheap and yields the same stream; the identity is the
/// [`StreamId`].
#[derive(Debug, Clone)]
pub struct AudioStreamHandle {
    id: StreamId,
    sample_rate: u32,
    signal: SignalBuffer,
}

impl AudioStreamHandle {
    /// Creates a new stream buffering up to `capacity` samples.
    pub fn new(sample_rate: u32, capacity: usize) -> Self {
        Self {
            id: StreamId(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed)),
            sample_rate,
            signal: SignalBuffer::with_capacity(capacity),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn signal(&self) -> &SignalBuffer {
        &self.signal
    }
}

/// Identity of one tap created by [`FrequencyAnalyzer::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapId(u64);

/// Result of an attach. `Inactive` stands for "no visualisation input" and is
/// what a failed attach yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerHandle {
    Active { tap: TapId, stream: StreamId },
    Inactive,
}

impl AnalyzerHandle {
    pub fn is_active(&self) -> bool {
        matches!(self, AnalyzerHandle::Active { .. })
    }

    pub fn stream(&self) -> Option<StreamId> {
        match self {
            AnalyzerHandle::Active { stream, .. } => Some(*stream),
            AnalyzerHandle::Inactive => None,
        }
    }
}

struct ActiveTap {
    id: TapId,
    stream: StreamId,
    snapshot: FrequencySnapshot,
}

/// Taps the playing stream and hands out one frequency snapshot per tick.
///
/// One analysis context is opened lazily on the first attach and reused for
/// every later stream until [`FrequencyAnalyzer::close`] (or drop). At most one
/// tap exists at a time; attaching a different stream replaces it.
pub struct FrequencyAnalyzer {
    config: AnalyzerConfig,
    backend: Box<dyn AudioBackend>,
    context: Option<Box<dyn AudioTap>>,
    tap: Option<ActiveTap>,
    next_tap: u64,
}

impl FrequencyAnalyzer {
    pub fn new(config: AnalyzerConfig, backend: Box<dyn AudioBackend>) -> Self {
        Self {
            config,
            backend,
            context: None,
            tap: None,
            next_tap: 1,
        }
    }

    /// Analyzer backed by the software FFT context.
    pub fn software(config: AnalyzerConfig) -> Self {
        Self::new(config, Box::new(SoftwareBackend::new()))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// State of the analysis context, if one is open.
    pub fn context_state(&self) -> Option<ContextState> {
        self.context.as_ref().map(|context| context.state())
    }

    /// Taps `stream`. Never fails: a refused context or connection is logged
    /// and reported as [`AnalyzerHandle::Inactive`].
    pub fn attach(&mut self, stream: &AudioStreamHandle) -> AnalyzerHandle {
        if let Some(active) = &self.tap {
            if active.stream == stream.id() {
                return AnalyzerHandle::Active {
                    tap: active.id,
                    stream: active.stream,
                };
            }
        }

        self.disconnect_current();

        match self.try_attach(stream) {
            Ok(handle) => {
                info!(stream = ?stream.id(), "attached frequency analyser");
                handle
            }
            Err(err) => {
                warn!(stream = ?stream.id(), error = %err, "audio attach failed; visualisation input disabled");
                AnalyzerHandle::Inactive
            }
        }
    }

    fn try_attach(&mut self, stream: &AudioStreamHandle) -> Result<AnalyzerHandle> {
        let opened_here = self.context.is_none();
        if opened_here {
            self.context = Some(self.backend.open(&self.config)?);
        }

        let mut guard = ContextGuard {
            slot: &mut self.context,
            armed: opened_here,
        };
        let context = guard
            .slot
            .as_mut()
            .ok_or_else(|| VisualiserError::msg("analysis context missing after open"))?;
        context.connect(stream)?;
        let bin_count = context.bin_count();
        guard.disarm();

        let id = TapId(self.next_tap);
        self.next_tap += 1;
        self.tap = Some(ActiveTap {
            id,
            stream: stream.id(),
            snapshot: FrequencySnapshot::zeroed(bin_count),
        });

        Ok(AnalyzerHandle::Active {
            tap: id,
            stream: stream.id(),
        })
    }

    /// Refreshes and returns the snapshot for `handle`.
    ///
    /// Returns `None` for inactive or stale handles, when the context is not
    /// running, or when the context cannot produce data. The returned buffer
    /// is overwritten by the next call.
    pub fn sample(&mut self, handle: AnalyzerHandle) -> Option<&FrequencySnapshot> {
        let AnalyzerHandle::Active { tap, .. } = handle else {
            return None;
        };
        let context = self.context.as_mut()?;
        if context.state() != ContextState::Running {
            return None;
        }
        let active = self.tap.as_mut().filter(|active| active.id == tap)?;

        if let Err(err) = context.fill_frequency_data(active.snapshot.bins_mut()) {
            debug!(error = %err, "frequency sample unavailable");
            return None;
        }
        Some(&active.snapshot)
    }

    /// Tears down the tap behind `handle`. Safe to call repeatedly and with
    /// stale or inactive handles.
    pub fn release(&mut self, handle: AnalyzerHandle) {
        let AnalyzerHandle::Active { tap, .. } = handle else {
            return;
        };
        if self.tap.as_ref().is_some_and(|active| active.id == tap) {
            self.disconnect_current();
        }
    }

    /// Resumes a suspended context. The analyzer never does this on its own;
    /// the playback side calls it when playback starts.
    pub fn resume(&mut self) -> Result<()> {
        match self.context.as_mut() {
            Some(context) if context.state() == ContextState::Suspended => {
                context.resume()?;
                debug!("analysis context resumed");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Ends the session: drops the tap and closes the context.
    pub fn close(&mut self) {
        self.disconnect_current();
        if let Some(mut context) = self.context.take() {
            context.close();
            info!("analysis context closed");
        }
    }

    fn disconnect_current(&mut self) {
        if let Some(active) = self.tap.take() {
            if let Some(context) = self.context.as_mut() {
                context.disconnect();
            }
            debug!(stream = ?active.stream, "released analyser tap");
        }
    }
}

impl Drop for FrequencyAnalyzer {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for FrequencyAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyAnalyzer")
            .field("config", &self.config)
            .field("context", &self.context_state())
            .field("tapped_stream", &self.tap.as_ref().map(|active| active.stream))
            .finish()
    }
}

/// Closes a context opened during a failing attach.
struct ContextGuard<'a> {
    slot: &'a mut Option<Box<dyn AudioTap>>,
    armed: bool,
}

impl ContextGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(mut context) = self.slot.take() {
                context.close();
            }
        }
    }
}
