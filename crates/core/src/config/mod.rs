use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{mapping::Rgb, Result, VisualiserError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analyzer: AnalyzerConfig,
    pub meter: MeterConfig,
    pub scene: SceneConfig,
}

impl AppConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.analyzer.validate()?;
        self.meter.validate()?;
        self.scene.validate()
    }
}

/// Configuration of the frequency analysis context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Transform length in samples. The snapshot carries half as many bins.
    pub fft_size: usize,
    /// Weight of the previous magnitude when smoothing bins over time.
    pub smoothing: f32,
    /// Level mapped onto byte value 0.
    pub min_db: f32,
    /// Level mapped onto byte value 255.
    pub max_db: f32,
    /// Create contexts suspended, the way autoplay policies do.
    pub start_suspended: bool,
}

impl AnalyzerConfig {
    /// Number of frequency bins in every snapshot.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(VisualiserError::Config(format!(
                "fft_size must be a power of two between 32 and 32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(VisualiserError::Config(format!(
                "smoothing must lie in [0, 1], got {}",
                self.smoothing
            )));
        }
        if self.min_db >= self.max_db {
            return Err(VisualiserError::Config(format!(
                "min_db ({}) must be below max_db ({})",
                self.min_db, self.max_db
            )));
        }
        Ok(())
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
            start_suspended: false,
        }
    }
}

/// Configuration of the bar meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub band_count: usize,
    /// Reveal delay added per bar index, in seconds.
    pub stagger_step: f64,
    /// Lower bound of idle placeholder magnitudes (raw 0..=255 domain).
    pub placeholder_floor: f64,
    /// Width of the idle placeholder range above the floor.
    pub placeholder_span: f64,
}

impl MeterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.band_count == 0 {
            return Err(VisualiserError::Config(
                "band_count must be at least one".to_string(),
            ));
        }
        if self.stagger_step < 0.0 {
            return Err(VisualiserError::Config(
                "stagger_step must not be negative".to_string(),
            ));
        }
        if self.placeholder_floor < 0.0
            || self.placeholder_span < 0.0
            || self.placeholder_floor + self.placeholder_span > 255.0
        {
            return Err(VisualiserError::Config(
                "placeholder range must lie within [0, 255]".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            band_count: crate::features::BAND_COUNT,
            stagger_step: 0.05,
            placeholder_floor: 10.0,
            placeholder_span: 50.0,
        }
    }
}

/// Configuration of the 3D scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub camera_distance: f32,
    pub sphere_radius: f32,
    pub sphere_segments: u32,
    pub particle_count: usize,
    /// Edge length of the cube the particles are scattered in.
    pub particle_bound: f32,
    pub particle_size: f32,
    pub particle_opacity: f32,
    /// Radians added to the central mesh's x and y rotation every frame.
    pub mesh_spin: f32,
    /// Radians added to the particle field's y rotation every frame.
    pub particle_spin: f32,
    pub palette: Palette,
}

impl SceneConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(VisualiserError::Config(format!(
                "fov_degrees must lie in (0, 180), got {}",
                self.fov_degrees
            )));
        }
        if !(self.near > 0.0 && self.near < self.far) {
            return Err(VisualiserError::Config(
                "clip planes must satisfy 0 < near < far".to_string(),
            ));
        }
        if self.particle_bound <= 0.0 {
            return Err(VisualiserError::Config(
                "particle_bound must be positive".to_string(),
            ));
        }
        if self.mesh_spin < 0.0 || self.particle_spin < 0.0 {
            return Err(VisualiserError::Config(
                "rotation increments must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            camera_distance: 5.0,
            sphere_radius: 1.0,
            sphere_segments: 32,
            particle_count: 5000,
            particle_bound: 10.0,
            particle_size: 0.02,
            particle_opacity: 0.8,
            mesh_spin: 0.005,
            particle_spin: 0.001,
            palette: Palette::default(),
        }
    }
}

/// Three particle colours selected by magnitude band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub cool: Rgb,
    pub mid: Rgb,
    pub warm: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            cool: Rgb(0x00F5FF),
            mid: Rgb(0x9B87F5),
            warm: Rgb(0xFF00FF),
        }
    }
}
