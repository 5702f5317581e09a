use std::{f32::consts::PI, fmt, ops::Deref, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AnalyzerConfig, Result, VisualiserError};

const BLACKMAN_ALPHA: f32 = 0.16;

/// Byte magnitudes for one tick, one entry per frequency bin.
///
/// The buffer belongs to the analyser tap that fills it and is overwritten in
/// place on every tick. Copy it with [`FrequencySnapshot::to_vec`] to keep the
/// values around for longer than a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySnapshot {
    bins: Vec<u8>,
}

impl FrequencySnapshot {
    /// Creates a zeroed snapshot with `bin_count` bins.
    pub fn zeroed(bin_count: usize) -> Self {
        Self {
            bins: vec![0; bin_count],
        }
    }

    /// Wraps already computed bins.
    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub(crate) fn bins_mut(&mut self) -> &mut [u8] {
        &mut self.bins
    }
}

impl Deref for FrequencySnapshot {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bins
    }
}

/// Frequency-transform node that turns a window of time-domain samples into
/// smoothed, decibel-scaled byte magnitudes.
///
/// The mapping follows the familiar browser analyser: Blackman window, real
/// FFT, magnitudes scaled by `1 / fft_size`, exponential smoothing across
/// calls, then the `[min_db, max_db]` range spread linearly over `0..=255`.
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl SpectrumAnalyser {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let fft_size = config.fft_size;
        Ok(Self {
            fft_size,
            smoothing: config.smoothing,
            min_db: config.min_db,
            max_db: config.max_db,
            window: (0..fft_size)
                .map(|index| blackman_value(index, fft_size))
                .collect(),
            smoothed: vec![0.0; fft_size / 2],
            fft: FftResources::plan(fft_size),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins each snapshot carries.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forgets the smoothing history, e.g. after switching streams.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
    }

    /// Transforms exactly `fft_size` samples and writes `bin_count` bytes.
    pub fn process(&mut self, samples: &[f32], out: &mut [u8]) -> Result<()> {
        if samples.len() != self.fft_size {
            return Err(VisualiserError::InvalidInput(
                "analyser input must hold exactly fft_size samples",
            ));
        }
        if out.len() != self.bin_count() {
            return Err(VisualiserError::InvalidInput(
                "analyser output must hold exactly fft_size / 2 bins",
            ));
        }

        let smoothing = self.smoothing;
        let min_db = self.min_db;
        let db_range = self.max_db - self.min_db;
        let scale = 1.0 / self.fft_size as f32;
        let fft = &mut self.fft;

        for ((slot, sample), weight) in fft.input.iter_mut().zip(samples).zip(&self.window) {
            *slot = sample * weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        for ((smoothed, bin), byte) in self
            .smoothed
            .iter_mut()
            .zip(&fft.spectrum)
            .zip(out.iter_mut())
        {
            let magnitude = bin.norm() * scale;
            *smoothed = smoothing * *smoothed + (1.0 - smoothing) * magnitude;

            let db = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = (255.0 / db_range) * (db - min_db);
            *byte = if scaled.is_finite() {
                scaled.floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        Ok(())
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(size: usize) -> Self {
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        Self {
            size,
            plan,
            scratch,
            spectrum,
            input,
        }
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_db", &self.min_db)
            .field("max_db", &self.max_db)
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    let a0 = 0.5 * (1.0 - BLACKMAN_ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * BLACKMAN_ALPHA;
    let phase = 2.0 * PI * index as f32 / len as f32;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}
