//! Persistent 3D scene driven by the scalar audio average.
//!
//! The engine owns the camera, the lights, a wireframe sphere and a particle
//! cloud. Its render loop spins the sphere and the cloud every frame whether
//! or not audio is present; audio only changes the sphere's scale and the
//! cloud's colour.

use glam::{EulerRot, Mat4, Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    mapping::{palette_band, scale_for_average, PaletteBand, Rgb},
    FrameId, FrameScheduler, FrameTick, Result, SceneConfig, SceneFrame, SceneSurface,
    VisualiserError,
};

/// Lifecycle of a [`SceneEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneLifecycle {
    Uninitialized,
    Running,
    /// Construction failed; nothing is drawn and no frame is requested.
    Failed,
    /// Terminal.
    Disposed,
}

/// Visual parameters mutated by the engine alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneState {
    pub mesh_scale: f64,
    pub mesh_rotation_x: f32,
    pub mesh_rotation_y: f32,
    pub particle_rotation_y: f32,
    pub particle_band: PaletteBand,
    pub particle_color: Rgb,
}

impl SceneState {
    fn neutral(config: &SceneConfig) -> Self {
        Self {
            mesh_scale: 1.0,
            mesh_rotation_x: 0.0,
            mesh_rotation_y: 0.0,
            particle_rotation_y: 0.0,
            particle_band: PaletteBand::Cool,
            particle_color: config.palette.cool,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl PerspectiveCamera {
    pub fn view_projection(&self) -> Mat4 {
        let projection =
            Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far);
        let view = Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y);
        projection * view
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: Rgb,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub color: Rgb,
    pub intensity: f32,
    pub position: Vec3,
}

/// Wireframe UV sphere at the centre of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralMesh {
    pub radius: f32,
    pub segments: u32,
    pub color: Rgb,
    pub wireframe: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleField {
    pub positions: Vec<Vec3>,
    pub size: f32,
    pub opacity: f32,
}

impl ParticleField {
    /// Scatters `count` points uniformly in a cube of edge `bound` centred on
    /// the origin.
    pub fn scatter<R: Rng + ?Sized>(
        count: usize,
        bound: f32,
        size: f32,
        opacity: f32,
        rng: &mut R,
    ) -> Self {
        let positions = (0..count)
            .map(|_| {
                Vec3::new(
                    (rng.gen::<f32>() - 0.5) * bound,
                    (rng.gen::<f32>() - 0.5) * bound,
                    (rng.gen::<f32>() - 0.5) * bound,
                )
            })
            .collect();
        Self {
            positions,
            size,
            opacity,
        }
    }
}

/// Scene graph allocated on mount.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub camera: PerspectiveCamera,
    pub ambient: AmbientLight,
    pub point: PointLight,
    pub mesh: CentralMesh,
    pub particles: ParticleField,
}

impl Scene {
    fn build<R: Rng + ?Sized>(config: &SceneConfig, width: u32, height: u32, rng: &mut R) -> Self {
        Self {
            camera: PerspectiveCamera {
                fov_degrees: config.fov_degrees,
                aspect: aspect_ratio(width, height),
                near: config.near,
                far: config.far,
                position: Vec3::new(0.0, 0.0, config.camera_distance),
            },
            ambient: AmbientLight {
                color: Rgb(0xFFFFFF),
                intensity: 0.5,
            },
            point: PointLight {
                color: config.palette.mid,
                intensity: 2.0,
                position: Vec3::new(5.0, 5.0, 5.0),
            },
            mesh: CentralMesh {
                radius: config.sphere_radius,
                segments: config.sphere_segments,
                color: config.palette.mid,
                wireframe: true,
            },
            particles: ParticleField::scatter(
                config.particle_count,
                config.particle_bound,
                config.particle_size,
                config.particle_opacity,
                rng,
            ),
        }
    }
}

/// Owner of the scene, its state and its render loop.
#[derive(Debug)]
pub struct SceneEngine<S: SceneSurface> {
    config: SceneConfig,
    surface: S,
    lifecycle: SceneLifecycle,
    scene: Option<Scene>,
    state: SceneState,
    pending: Option<FrameId>,
}

impl<S: SceneSurface> SceneEngine<S> {
    pub fn new(config: SceneConfig, surface: S) -> Self {
        let state = SceneState::neutral(&config);
        Self {
            config,
            surface,
            lifecycle: SceneLifecycle::Uninitialized,
            scene: None,
            state,
            pending: None,
        }
    }

    pub fn lifecycle(&self) -> SceneLifecycle {
        self.lifecycle
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Outstanding frame request of the render loop, if it is running.
    pub fn pending_frame(&self) -> Option<FrameId> {
        self.pending
    }

    /// Builds the scene and starts the render loop.
    ///
    /// A missing surface or graphics context moves the engine to
    /// [`SceneLifecycle::Failed`] without requesting a frame.
    pub fn mount<R: Rng + ?Sized>(
        &mut self,
        scheduler: &mut dyn FrameScheduler,
        rng: &mut R,
    ) -> Result<()> {
        if self.lifecycle != SceneLifecycle::Uninitialized {
            return Err(VisualiserError::Lifecycle(
                "scene engine can only be mounted once",
            ));
        }

        let (width, height) = match self.surface.size() {
            Some((width, height)) if width > 0 && height > 0 => (width, height),
            size => {
                self.lifecycle = SceneLifecycle::Failed;
                warn!(?size, "scene surface has no drawable area");
                return Err(VisualiserError::SurfaceUnavailable(
                    "surface reports no drawable area".to_string(),
                ));
            }
        };

        if let Err(err) = self.surface.bind() {
            self.lifecycle = SceneLifecycle::Failed;
            warn!(error = %err, "failed to bind scene surface");
            return Err(err);
        }

        self.scene = Some(Scene::build(&self.config, width, height, rng));
        self.pending = Some(scheduler.request_frame());
        self.lifecycle = SceneLifecycle::Running;
        info!(
            width,
            height,
            particles = self.config.particle_count,
            "scene engine running"
        );
        Ok(())
    }

    /// Advances the render loop if `tick` carries this engine's request.
    pub fn on_frame(&mut self, tick: &FrameTick, scheduler: &mut dyn FrameScheduler) {
        if self.lifecycle != SceneLifecycle::Running {
            return;
        }
        match self.pending {
            Some(id) if tick.fires(id) => self.pending = None,
            _ => return,
        }

        self.state.mesh_rotation_x += self.config.mesh_spin;
        self.state.mesh_rotation_y += self.config.mesh_spin;
        self.state.particle_rotation_y += self.config.particle_spin;

        if let Some(frame) = self.frame() {
            if let Err(err) = self.surface.draw(&frame) {
                warn!(error = %err, frame = tick.index, "scene draw failed");
            }
        }

        self.pending = Some(scheduler.request_frame());
    }

    /// Applies a new scalar average to the sphere scale and particle colour.
    pub fn push_average(&mut self, average: f64) {
        if self.lifecycle != SceneLifecycle::Running {
            return;
        }
        let band = palette_band(average);
        self.state.mesh_scale = scale_for_average(average);
        self.state.particle_band = band;
        self.state.particle_color = band.color(&self.config.palette);
    }

    /// Follows a viewport change. Rotation and scale are left alone.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.lifecycle != SceneLifecycle::Running || width == 0 || height == 0 {
            return;
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.camera.aspect = aspect_ratio(width, height);
        }
        self.surface.resize(width, height);
        debug!(width, height, "scene resized");
    }

    /// Stops the render loop and releases the surface. Safe to call again.
    pub fn dispose(&mut self, scheduler: &mut dyn FrameScheduler) {
        match self.lifecycle {
            SceneLifecycle::Disposed => return,
            SceneLifecycle::Running => {
                if let Some(id) = self.pending.take() {
                    scheduler.cancel_frame(id);
                }
                self.surface.release();
                self.scene = None;
                info!("scene engine disposed");
            }
            SceneLifecycle::Uninitialized | SceneLifecycle::Failed => {}
        }
        self.lifecycle = SceneLifecycle::Disposed;
    }

    /// Draw data for the current state.
    pub fn frame(&self) -> Option<SceneFrame> {
        let scene = self.scene.as_ref()?;
        let mesh_rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.state.mesh_rotation_x,
            self.state.mesh_rotation_y,
            0.0,
        );
        let mesh_model = Mat4::from_scale_rotation_translation(
            Vec3::splat(self.state.mesh_scale as f32),
            mesh_rotation,
            Vec3::ZERO,
        );
        Some(SceneFrame {
            view_projection: scene.camera.view_projection(),
            mesh_model,
            mesh_color: scene.mesh.color,
            particle_model: Mat4::from_rotation_y(self.state.particle_rotation_y),
            particle_color: self.state.particle_color,
            particle_count: scene.particles.positions.len(),
        })
    }
}

/// Callers only pass non-zero dimensions.
fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height as f32
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::testing::FakeSurface;
    use crate::FrameClock;

    fn small_config() -> SceneConfig {
        SceneConfig {
            particle_count: 64,
            ..SceneConfig::default()
        }
    }

    fn running_engine(clock: &mut FrameClock) -> SceneEngine<FakeSurface> {
        let mut engine = SceneEngine::new(small_config(), FakeSurface::new(800, 400));
        engine.mount(clock, &mut StdRng::seed_from_u64(7)).unwrap();
        engine
    }

    #[test]
    fn mount_builds_scene_and_requests_one_frame() {
        let mut clock = FrameClock::new();
        let engine = running_engine(&mut clock);

        assert_eq!(engine.lifecycle(), SceneLifecycle::Running);
        assert_eq!(clock.pending(), 1);
        let scene = engine.scene().unwrap();
        assert_eq!(scene.camera.aspect, 2.0);
        assert_eq!(scene.camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(scene.particles.positions.len(), 64);
        assert!(scene
            .particles
            .positions
            .iter()
            .all(|p| p.abs().max_element() <= 5.0));
        assert!(engine.surface().bound);
    }

    #[test]
    fn missing_surface_fails_without_registering() {
        let mut clock = FrameClock::new();
        let mut engine = SceneEngine::new(small_config(), FakeSurface::detached());
        let err = engine
            .mount(&mut clock, &mut StdRng::seed_from_u64(1))
            .unwrap_err();

        assert!(matches!(err, VisualiserError::SurfaceUnavailable(_)));
        assert_eq!(engine.lifecycle(), SceneLifecycle::Failed);
        assert_eq!(clock.requested(), 0);
        assert!(engine.scene().is_none());
    }

    #[test]
    fn zero_sized_surface_fails_without_binding() {
        let mut clock = FrameClock::new();
        let mut engine = SceneEngine::new(small_config(), FakeSurface::new(0, 480));
        let err = engine
            .mount(&mut clock, &mut StdRng::seed_from_u64(1))
            .unwrap_err();

        assert!(matches!(err, VisualiserError::SurfaceUnavailable(_)));
        assert_eq!(engine.lifecycle(), SceneLifecycle::Failed);
        assert!(!engine.surface().bound);
        assert_eq!(clock.requested(), 0);
        assert!(engine.frame().is_none());

        let mut engine = SceneEngine::new(small_config(), FakeSurface::new(640, 0));
        assert!(engine.mount(&mut clock, &mut StdRng::seed_from_u64(1)).is_err());
        assert_eq!(engine.lifecycle(), SceneLifecycle::Failed);
    }

    #[test]
    fn bind_failure_fails_without_registering() {
        let mut clock = FrameClock::new();
        let surface = FakeSurface::new(10, 10).refuse_bind();
        let mut engine = SceneEngine::new(small_config(), surface);
        assert!(engine.mount(&mut clock, &mut StdRng::seed_from_u64(1)).is_err());
        assert_eq!(engine.lifecycle(), SceneLifecycle::Failed);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn mounting_twice_is_rejected() {
        let mut clock = FrameClock::new();
        let mut engine = running_engine(&mut clock);
        assert!(matches!(
            engine.mount(&mut clock, &mut StdRng::seed_from_u64(1)),
            Err(VisualiserError::Lifecycle(_))
        ));
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn rotation_accumulates_without_audio() {
        let mut clock = FrameClock::new();
        let mut engine = running_engine(&mut clock);

        for _ in 0..10 {
            let tick = clock.next_frame();
            engine.on_frame(&tick, &mut clock);
        }

        let state = engine.state();
        assert!((state.mesh_rotation_x - 0.05).abs() < 1e-5);
        assert!((state.mesh_rotation_y - 0.05).abs() < 1e-5);
        assert!((state.particle_rotation_y - 0.01).abs() < 1e-5);
        assert_eq!(state.mesh_scale, 1.0);
        assert_eq!(engine.surface().draws, 10);
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn ignores_ticks_that_do_not_carry_its_request() {
        let mut clock = FrameClock::new();
        let mut engine = running_engine(&mut clock);
        let tick = FrameClock::new().next_frame();
        engine.on_frame(&tick, &mut clock);
        assert_eq!(engine.state().mesh_rotation_x, 0.0);
    }

    #[test]
    fn average_drives_scale_and_colour() {
        let mut clock = FrameClock::new();
        let mut engine = running_engine(&mut clock);

        engine.push_average(255.0);
        assert_eq!(engine.state().mesh_scale, 1.3);
        assert_eq!(engine.state().particle_color, Rgb(0xFF00FF));

        engine.push_average(75.0);
        assert_eq!(engine.state().particle_band, PaletteBand::Mid);

        engine.push_average(0.0);
        assert_eq!(engine.state().mesh_scale, 1.0);
        assert_eq!(engine.state().particle_color, Rgb(0x00F5FF));
    }

    #[test]
    fn drawn_frame_reflects_state() {
        let mut clock = FrameClock::new();
        let mut engine = running_engine(&mut clock);
        engine.push_average(255.0);
        let tick = clock.next_frame();
        engine.on_frame(&tick, &mut clock);

        let frame = engine.surface().last.clone().unwrap();
        assert_eq!(frame.particle_color, Rgb(0xFF00FF));
        assert_eq!(frame.particle_count, 64);
        let (scale, _, _) = frame.mesh_model.to_scale_rotation_translation();
        assert!((scale.x - 1.3).abs() < 1e-5);
    }

    #[test]
    fn resize_updates_aspect_only() {
        let mut clock = FrameClock::new();
        let mut engine = running_engine(&mut clock);
        engine.push_average(200.0);
        let tick = clock.next_frame();
        engine.on_frame(&tick, &mut clock);
        let before = engine.state().clone();

        engine.resize(300, 300);
        assert_eq!(engine.scene().unwrap().camera.aspect, 1.0);
        assert_eq!(engine.surface().size, Some((300, 300)));
        assert_eq!(engine.state(), &before);

        engine.resize(300, 0);
        assert_eq!(engine.scene().unwrap().camera.aspect, 1.0);
    }

    #[test]
    fn dispose_cancels_exactly_one_frame_and_is_idempotent() {
        let mut clock = FrameClock::new();
        let mut engine = running_engine(&mut clock);
        let tick = clock.next_frame();
        engine.on_frame(&tick, &mut clock);

        engine.dispose(&mut clock);
        assert_eq!(clock.cancelled(), 1);
        assert_eq!(clock.pending(), 0);
        assert_eq!(engine.lifecycle(), SceneLifecycle::Disposed);
        assert!(!engine.surface().bound);
        assert_eq!(engine.surface().releases, 1);

        engine.dispose(&mut clock);
        assert_eq!(clock.cancelled(), 1);
        assert_eq!(engine.surface().releases, 1);

        let tick = clock.next_frame();
        engine.on_frame(&tick, &mut clock);
        assert_eq!(engine.surface().draws, 1);
        assert!(engine.mount(&mut clock, &mut StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn disposing_unmounted_engine_cancels_nothing() {
        let mut clock = FrameClock::new();
        let mut engine = SceneEngine::new(small_config(), FakeSurface::new(1, 1));
        engine.dispose(&mut clock);
        assert_eq!(clock.cancelled(), 0);
        assert_eq!(engine.lifecycle(), SceneLifecycle::Disposed);
    }

    #[test]
    fn draw_errors_keep_the_loop_alive() {
        let mut clock = FrameClock::new();
        let surface = FakeSurface::new(4, 4).failing_draws();
        let mut engine = SceneEngine::new(small_config(), surface);
        engine.mount(&mut clock, &mut StdRng::seed_from_u64(3)).unwrap();
        let tick = clock.next_frame();
        engine.on_frame(&tick, &mut clock);
        assert_eq!(clock.pending(), 1);
        assert!(engine.state().mesh_rotation_x > 0.0);
    }
}
