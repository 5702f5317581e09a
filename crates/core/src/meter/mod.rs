//! Bar meter view: one bar per band, heights as a percentage of the track.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{features::BandedMagnitudes, mapping::bar_height_percent, MeterConfig};

/// One rendered bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Height in `[0, 100]` percent of the track.
    pub height_percent: f64,
    /// Reveal delay in seconds; grows with the bar index.
    pub delay_seconds: f64,
}

/// The bars the host draws this frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizerBarSet {
    pub bars: Vec<Bar>,
}

impl VisualizerBarSet {
    pub fn heights(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|bar| bar.height_percent)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Where the current bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterSource {
    Live,
    Idle,
}

/// Bar meter with idle placeholders fixed for the lifetime of a mount.
#[derive(Debug, Clone)]
pub struct BarMeter {
    config: MeterConfig,
    placeholder: Vec<f64>,
    bars: VisualizerBarSet,
    source: MeterSource,
}

impl BarMeter {
    /// Mounts a meter, drawing its idle placeholders from `rng`.
    pub fn mount<R: Rng + ?Sized>(config: MeterConfig, rng: &mut R) -> Self {
        let placeholder = placeholder_values(&config, rng);
        let bars = bar_set(&config, &placeholder);
        Self {
            config,
            placeholder,
            bars,
            source: MeterSource::Idle,
        }
    }

    /// Draws fresh placeholders, as a remount would.
    pub fn remount<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.placeholder = placeholder_values(&self.config, rng);
        if self.source == MeterSource::Idle {
            self.bars = bar_set(&self.config, &self.placeholder);
        }
    }

    /// Recomputes the bars from live bands, or from the mount's placeholders
    /// when there are none.
    pub fn render(&mut self, bands: Option<&BandedMagnitudes>) -> &VisualizerBarSet {
        match bands {
            Some(bands) => {
                self.bars = bar_set(&self.config, bands.as_slice());
                self.source = MeterSource::Live;
            }
            None => {
                self.bars = bar_set(&self.config, &self.placeholder);
                self.source = MeterSource::Idle;
            }
        }
        &self.bars
    }

    pub fn bars(&self) -> &VisualizerBarSet {
        &self.bars
    }

    pub fn source(&self) -> MeterSource {
        self.source
    }
}

fn placeholder_values<R: Rng + ?Sized>(config: &MeterConfig, rng: &mut R) -> Vec<f64> {
    (0..config.band_count)
        .map(|_| rng.gen::<f64>() * config.placeholder_span + config.placeholder_floor)
        .collect()
}

fn bar_set(config: &MeterConfig, magnitudes: &[f64]) -> VisualizerBarSet {
    let bars = magnitudes
        .iter()
        .enumerate()
        .map(|(index, &magnitude)| Bar {
            height_percent: bar_height_percent(magnitude),
            delay_seconds: index as f64 * config.stagger_step,
        })
        .collect();
    VisualizerBarSet { bars }
}
