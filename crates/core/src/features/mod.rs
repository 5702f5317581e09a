//! Reduction of a frequency snapshot into the handful of numbers the visuals
//! consume: twenty banded magnitudes for the meter and one average for the
//! scene.

use serde::{Deserialize, Serialize};

/// Number of bands the meter displays.
pub const BAND_COUNT: usize = 20;

/// Mean magnitudes of contiguous, equal-width partitions of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandedMagnitudes(Vec<f64>);

impl BandedMagnitudes {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }
}

/// Features derived from one snapshot in a single reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub bands: BandedMagnitudes,
    pub average: f64,
}

/// Partitions `bins` into `band_count` windows of `len / band_count` bins and
/// averages each. Remainder bins are dropped; windows that cover no bins
/// evaluate to 0.
pub fn reduce_bars(bins: &[u8], band_count: usize) -> BandedMagnitudes {
    let width = if band_count == 0 {
        0
    } else {
        bins.len() / band_count
    };

    let bands = (0..band_count)
        .map(|band| {
            if width == 0 {
                return 0.0;
            }
            let start = band * width;
            let window = &bins[start..start + width];
            let sum: u64 = window.iter().map(|&bin| u64::from(bin)).sum();
            sum as f64 / width as f64
        })
        .collect();

    BandedMagnitudes(bands)
}

/// Unweighted mean of every bin. An empty snapshot averages to 0.
pub fn reduce_scalar(bins: &[u8]) -> f64 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u64 = bins.iter().map(|&bin| u64::from(bin)).sum();
    sum as f64 / bins.len() as f64
}

/// Runs both reductions over the same snapshot.
pub fn reduce(bins: &[u8], band_count: usize) -> FeatureFrame {
    FeatureFrame {
        bands: reduce_bars(bins, band_count),
        average: reduce_scalar(bins),
    }
}
