//! Routing of reduced audio features onto visual parameters.
//!
//! Every function here is pure. Raw magnitudes live in `[0, 255]` and are
//! normalised into `[0, 1]` before they touch a scale or a colour.

use serde::{Deserialize, Serialize};

use crate::config::Palette;

/// Largest raw magnitude a frequency bin can carry.
pub const MAX_MAGNITUDE: f64 = 255.0;

/// Extra scale the central mesh gains at full magnitude.
pub const SCALE_GAIN: f64 = 0.3;

/// Averages below this select the cool colour.
pub const MID_THRESHOLD: f64 = 50.0;

/// Averages at or above this select the warm colour.
pub const WARM_THRESHOLD: f64 = 100.0;

/// Packed `0xRRGGBB` colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub u32);

impl Rgb {
    /// Channels as linear floats in `[0, 1]`.
    pub fn to_f32_array(self) -> [f32; 3] {
        let r = ((self.0 >> 16) & 0xFF) as f32 / 255.0;
        let g = ((self.0 >> 8) & 0xFF) as f32 / 255.0;
        let b = (self.0 & 0xFF) as f32 / 255.0;
        [r, g, b]
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06X}", self.0 & 0xFF_FFFF)
    }
}

/// Which palette entry a magnitude selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaletteBand {
    Cool,
    Mid,
    Warm,
}

impl PaletteBand {
    pub fn color(self, palette: &Palette) -> Rgb {
        match self {
            PaletteBand::Cool => palette.cool,
            PaletteBand::Mid => palette.mid,
            PaletteBand::Warm => palette.warm,
        }
    }
}

/// Maps a raw magnitude into `[0, 1]`. NaN maps to 0.
pub fn normalize(magnitude: f64) -> f64 {
    if magnitude.is_nan() {
        return 0.0;
    }
    (magnitude / MAX_MAGNITUDE).clamp(0.0, 1.0)
}

/// Uniform scale for the central mesh, within `[1.0, 1.0 + SCALE_GAIN]`.
pub fn scale_for_average(average: f64) -> f64 {
    1.0 + normalize(average) * SCALE_GAIN
}

/// Discrete three-band colour selection with half-open bands.
pub fn palette_band(average: f64) -> PaletteBand {
    let level = if average.is_nan() {
        0.0
    } else {
        average.clamp(0.0, MAX_MAGNITUDE)
    };
    if level < MID_THRESHOLD {
        PaletteBand::Cool
    } else if level < WARM_THRESHOLD {
        PaletteBand::Mid
    } else {
        PaletteBand::Warm
    }
}

/// Bar height as a percentage of the meter track, clamped to `[0, 100]`.
pub fn bar_height_percent(magnitude: f64) -> f64 {
    normalize(magnitude) * 100.0
}
