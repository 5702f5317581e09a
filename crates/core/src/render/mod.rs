use glam::Mat4;

use crate::{mapping::Rgb, Result, VisualiserError};

/// Everything a backend needs to draw one frame of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFrame {
    pub view_projection: Mat4,
    pub mesh_model: Mat4,
    pub mesh_color: Rgb,
    pub particle_model: Mat4,
    pub particle_color: Rgb,
    pub particle_count: usize,
}

/// Drawable target the scene engine renders into.
///
/// The surface is the one thing the host embeds in its layout. Backends wrap
/// a window, a canvas or an offscreen target; tests use fakes.
pub trait SceneSurface {
    /// Current drawable size in pixels, or `None` when there is nothing to
    /// draw into.
    fn size(&self) -> Option<(u32, u32)>;

    /// Acquires the graphics context. Called once before the first frame.
    fn bind(&mut self) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32);

    fn draw(&mut self, frame: &SceneFrame) -> Result<()>;

    /// Gives the graphics context back. Idempotent.
    fn release(&mut self);
}

/// Offscreen surface that keeps the most recent frame instead of drawing it.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    size: Option<(u32, u32)>,
    bound: bool,
    frames_drawn: u64,
    last_frame: Option<SceneFrame>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Some((width, height)),
            ..Self::default()
        }
    }

    /// A surface with no drawable area, as when the host has no container.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn last_frame(&self) -> Option<&SceneFrame> {
        self.last_frame.as_ref()
    }
}

impl SceneSurface for HeadlessSurface {
    fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn bind(&mut self) -> Result<()> {
        if self.size.is_none() {
            return Err(VisualiserError::SurfaceUnavailable(
                "headless surface has no drawable area".to_string(),
            ));
        }
        self.bound = true;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = Some((width, height));
    }

    fn draw(&mut self, frame: &SceneFrame) -> Result<()> {
        if !self.bound {
            return Err(VisualiserError::SurfaceUnavailable(
                "draw on an unbound surface".to_string(),
            ));
        }
        self.frames_drawn += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    fn release(&mut self) {
        self.bound = false;
    }
}
