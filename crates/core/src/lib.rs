//! Core library for the Spectral Visualiser.
//!
//! Audio flows in one direction: a playing stream is tapped by the
//! [`FrequencyAnalyzer`], each sampling tick's snapshot is reduced to banded
//! magnitudes and one average, and those drive the [`BarMeter`] and the
//! [`SceneEngine`]. All loops are cooperative and run off a
//! [`FrameScheduler`], so the whole pipeline can be driven by the
//! deterministic [`FrameClock`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod mapping;
pub mod meter;
pub mod render;
pub mod scene;
pub mod session;
pub mod timeline;

#[cfg(test)]
mod testing;

pub use analysis::{FrequencySnapshot, SpectrumAnalyser};
pub use audio::{
    AnalyzerHandle, AudioBackend, AudioStreamHandle, AudioTap, ContextState, FrequencyAnalyzer,
    SignalBuffer, SoftwareBackend, SoftwareTap, StreamId, TapId,
};
pub use config::{AnalyzerConfig, AppConfig, MeterConfig, Palette, SceneConfig};
pub use error::{Result, VisualiserError};
pub use features::{reduce_bars, reduce_scalar, BandedMagnitudes, FeatureFrame, BAND_COUNT};
pub use mapping::{PaletteBand, Rgb};
pub use meter::{Bar, BarMeter, MeterSource, VisualizerBarSet};
pub use render::{HeadlessSurface, SceneFrame, SceneSurface};
pub use scene::{SceneEngine, SceneLifecycle, SceneState};
pub use session::{PlaybackState, Visualiser};
pub use timeline::{FrameClock, FrameId, FrameScheduler, FrameTick};
