use tracing::debug;

use super::{AudioStreamHandle, SignalBuffer};
use crate::{AnalyzerConfig, Result, SpectrumAnalyser, VisualiserError};

/// Run state of an analysis context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but held back, typically by an autoplay policy.
    Suspended,
    Running,
    /// Terminal. A closed context never produces data again.
    Closed,
}

/// Native analysis context able to tap one stream at a time.
///
/// Implementations wrap whatever the platform offers (an audio graph, a
/// capture client, a software FFT). Tapping must leave the stream's own
/// playback path untouched.
pub trait AudioTap: Send {
    fn state(&self) -> ContextState;

    /// Moves a suspended context to running.
    fn resume(&mut self) -> Result<()>;

    /// Routes `stream` into the frequency-transform node.
    fn connect(&mut self, stream: &AudioStreamHandle) -> Result<()>;

    /// Removes the current route. Does nothing when nothing is connected.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Number of bins written by [`AudioTap::fill_frequency_data`].
    fn bin_count(&self) -> usize;

    /// Overwrites `out` with the current byte magnitudes.
    fn fill_frequency_data(&mut self, out: &mut [u8]) -> Result<()>;

    /// Releases native resources. Idempotent.
    fn close(&mut self);
}

/// Factory for analysis contexts.
pub trait AudioBackend: Send {
    fn open(&mut self, config: &AnalyzerConfig) -> Result<Box<dyn AudioTap>>;
}

/// Backend producing [`SoftwareTap`] contexts.
#[derive(Debug, Default, Clone)]
pub struct SoftwareBackend {
    deny: bool,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose platform refuses to construct contexts.
    pub fn denied() -> Self {
        Self { deny: true }
    }
}

impl AudioBackend for SoftwareBackend {
    fn open(&mut self, config: &AnalyzerConfig) -> Result<Box<dyn AudioTap>> {
        if self.deny {
            return Err(VisualiserError::AttachDenied(
                "audio context construction refused by platform policy".to_string(),
            ));
        }
        Ok(Box::new(SoftwareTap::new(config)?))
    }
}

/// Analysis context that reads a stream's [`SignalBuffer`] and runs it through
/// a [`SpectrumAnalyser`].
#[derive(Debug)]
pub struct SoftwareTap {
    state: ContextState,
    analyser: SpectrumAnalyser,
    source: Option<SignalBuffer>,
    window: Vec<f32>,
}

impl SoftwareTap {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let analyser = SpectrumAnalyser::new(config)?;
        let state = if config.start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        Ok(Self {
            state,
            window: vec![0.0; analyser.fft_size()],
            analyser,
            source: None,
        })
    }
}

impl AudioTap for SoftwareTap {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(VisualiserError::Lifecycle(
                "cannot resume a closed analysis context",
            )),
            _ => {
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn connect(&mut self, stream: &AudioStreamHandle) -> Result<()> {
        if self.state == ContextState::Closed {
            return Err(VisualiserError::AttachDenied(
                "analysis context is closed".to_string(),
            ));
        }
        debug!(stream = ?stream.id(), "connecting software tap");
        self.analyser.reset();
        self.source = Some(stream.signal().clone());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.source = None;
    }

    fn is_connected(&self) -> bool {
        self.source.is_some()
    }

    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn fill_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        if self.state != ContextState::Running {
            return Err(VisualiserError::InvalidInput(
                "analysis context is not running",
            ));
        }
        let source = self
            .source
            .as_ref()
            .ok_or(VisualiserError::InvalidInput("no stream is connected"))?;
        source.copy_latest(&mut self.window)?;
        self.analyser.process(&self.window, out)
    }

    fn close(&mut self) {
        self.source = None;
        self.state = ContextState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.05 * (2.0 * std::f32::consts::PI * 16.0 * i as f32 / 256.0).sin())
            .collect()
    }

    #[test]
    fn denied_backend_refuses_contexts() {
        let mut backend = SoftwareBackend::denied();
        let err = backend.open(&AnalyzerConfig::default()).err().unwrap();
        assert!(matches!(err, VisualiserError::AttachDenied(_)));
    }

    #[test]
    fn reads_connected_stream_without_draining_it() {
        let mut tap = SoftwareBackend::new()
            .open(&AnalyzerConfig::default())
            .unwrap();
        let stream = AudioStreamHandle::new(48_000, 1024);
        stream.signal().push_samples(&tone(256)).unwrap();

        tap.connect(&stream).unwrap();
        let mut out = vec![0_u8; tap.bin_count()];
        tap.fill_frequency_data(&mut out).unwrap();

        assert!(out[16] > 0);
        assert_eq!(stream.signal().len().unwrap(), 256);
    }

    #[test]
    fn suspended_context_produces_nothing_until_resumed() {
        let config = AnalyzerConfig {
            start_suspended: true,
            ..AnalyzerConfig::default()
        };
        let mut tap = SoftwareTap::new(&config).unwrap();
        let stream = AudioStreamHandle::new(48_000, 512);
        tap.connect(&stream).unwrap();

        let mut out = vec![0_u8; tap.bin_count()];
        assert_eq!(tap.state(), ContextState::Suspended);
        assert!(tap.fill_frequency_data(&mut out).is_err());

        tap.resume().unwrap();
        assert!(tap.fill_frequency_data(&mut out).is_ok());
    }

    #[test]
    fn closed_context_is_terminal() {
        let mut tap = SoftwareTap::new(&AnalyzerConfig::default()).unwrap();
        tap.close();
        tap.close();
        assert_eq!(tap.state(), ContextState::Closed);
        assert!(tap.resume().is_err());
        assert!(tap.connect(&AudioStreamHandle::new(48_000, 512)).is_err());
    }

    #[test]
    fn disconnected_tap_has_no_data() {
        let mut tap = SoftwareTap::new(&AnalyzerConfig::default()).unwrap();
        let mut out = vec![0_u8; tap.bin_count()];
        assert!(tap.fill_frequency_data(&mut out).is_err());
        assert!(!tap.is_connected());
    }
}
